//! Infrastructure Layer
//!
//! Concrete implementations of domain ports.
//! This layer handles all I/O operations.
//!
//! ## Structure
//!
//! - `directory/` - Directory store backends (File, Memory)
//! - `output/` - Output sinks and sink layers
//! - `home` - Home directory resolution

pub mod directory;
pub mod home;
pub mod output;

// Re-export for convenience
pub use directory::{FileDirectory, MemoryDirectory};
pub use output::{ConsoleSink, Layered, LogLayer, NoopSink, StoreLayer};
