//! Adapters implementing the domain ports
//!
//! - `llm`: Anthropic Messages API client and a scripted mock
//! - `sandbox`: Python subprocess sandbox
//! - `recorder`: filesystem session recorder

pub mod llm;
pub mod recorder;
pub mod sandbox;
