//! Core services: response parsing, prompt rendering, trial evaluation,
//! generation steps, the refinement cycle and submission building.

pub mod generation;
pub mod prompt;
pub mod response_parser;
pub mod submission;
pub mod trial_evaluator;
pub mod workflow;

pub use generation::{StepExecutor, StepRequest};
pub use response_parser::{ParsedResponse, ResponseParser};
pub use submission::build_submission;
pub use trial_evaluator::TrialEvaluator;
pub use workflow::{CycleReport, RefinementCycle, Workflow};
