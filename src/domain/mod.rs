//! Domain Layer
//!
//! Types and interfaces without I/O of their own.
//!
//! ## Structure
//!
//! - `entities/` - Descriptor, store records, run ledger records
//! - `value_objects/` - AppTuple, Phase, WorkDir, ConfigWarning
//! - `ports/` - DirectoryStore, OutputSink, App and Infrastructure traits

pub mod entities;
pub mod ports;
pub mod value_objects;
