//! Adapter implementations for audit trail ports.

pub mod file;
pub mod memory;
pub mod postgres;
pub mod process;

pub use file::FileSink;
pub use process::ProcessErrorSink;
