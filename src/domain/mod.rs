//! Domain layer for the seer orchestrator
//!
//! Core data model (grids, tasks, trials, steps, session results), the error
//! taxonomy, and the port traits the services depend on.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{CycleError, FailureKind, GenerationError, LlmError, SandboxError};
