//! Seer - dreamer/coder refinement over grid puzzles
//!
//! Seer solves grid-transformation tasks by alternating two model roles: a
//! "dreamer" that reasons about the examples and a "coder" that turns the
//! reasoning into a Python `transform` function. Every candidate is run in a
//! sandbox against the training pairs, and the results feed the next
//! refinement step until a candidate solves the task or the iteration budget
//! runs out.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): grids, tasks, trials, steps, errors and port traits
//! - **Service Layer** (`services`): prompt building, response parsing, generation steps,
//!   trial evaluation and the refinement cycle
//! - **Application Layer** (`application`): per-task runner and the concurrent scheduler
//! - **Infrastructure Layer** (`infrastructure`): configuration, logging, rate limiting,
//!   retry and task loading
//! - **Adapters** (`adapters`): Anthropic client, Python sandbox, filesystem recorder
//! - **CLI Layer** (`cli`): command-line interface

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use application::{Scheduler, TaskRunner};
pub use domain::models::{Config, Grid, Task, TaskOutcome, TaskResult};
