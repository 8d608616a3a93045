//! Port trait definitions (Hexagonal Architecture)
//!
//! Async trait interfaces that adapters implement:
//! - `LlmClient`: model calls
//! - `CodeSandbox`: isolated execution of generated code
//! - `Recorder`: session artifact storage

pub mod llm_client;
pub mod recorder;
pub mod sandbox;

pub use llm_client::{LlmClient, LlmResponse};
pub use recorder::{NullRecorder, Recorder};
pub use sandbox::CodeSandbox;
