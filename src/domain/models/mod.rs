//! Domain models

pub mod config;
pub mod grid;
pub mod session;
pub mod step;
pub mod task;
pub mod trial;

pub use config::{
    Config, InstructionsConfig, LlmConfig, LoggingConfig, RateLimitConfig, RetryConfig,
    RoleConfig, SandboxConfig, WorkflowKind, CODER, DREAMER,
};
pub use grid::{Grid, GridComparison};
pub use session::{
    CycleState, SessionSummary, Submission, SubmissionEntry, TaskFailure, TaskOutcome, TaskResult,
};
pub use step::{
    AttemptRecord, CodeCandidate, CodeLanguage, GenerationStep, StepPhase, TokenUsage,
};
pub use task::{ExamplePair, Task};
pub use trial::{best_trial, ExampleResult, RunFailureKind, SetOutcome, TestGating, Trial};
