//! Infrastructure layer module
//!
//! - Configuration management (figment)
//! - Logging (tracing)
//! - Admission control (token buckets)
//! - Retry policy for model calls
//! - Task loading

pub mod config;
pub mod logging;
pub mod rate_limit;
pub mod retry;
pub mod tasks;
