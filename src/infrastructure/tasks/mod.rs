//! Puzzle task loading from JSON files

pub mod loader;

pub use loader::{load_tasks, TaskLoadError};
