//! Session recorder adapters

pub mod fs;

pub use fs::FsRecorder;
