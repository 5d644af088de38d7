//! Directory Store Implementations
//!
//! Concrete implementations of the DirectoryStore port.

mod file;
mod memory;

pub use file::{FileDirectory, DEFAULT_FILE_NAME};
pub use memory::MemoryDirectory;
