//! Application layer: task runner, worker-pool scheduler and the shared
//! session registry.

pub mod registry;
pub mod scheduler;
pub mod task_runner;

pub use registry::SessionRegistry;
pub use scheduler::{ProgressCallback, Scheduler};
pub use task_runner::TaskRunner;
