//! Code sandbox adapters

pub mod entry_point;
pub mod harness;
pub mod python;

pub use python::PythonSandbox;
