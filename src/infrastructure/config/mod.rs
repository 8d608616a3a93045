//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment:
//! - YAML file loading with local overrides
//! - Environment variable overrides
//! - Validation and resolution of referenced prompt files

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
