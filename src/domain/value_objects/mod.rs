//! Domain Value Objects
//!
//! Immutable value types that represent domain concepts.

mod app_tuple;
mod config_warning;
mod phase;

pub use app_tuple::{AppTuple, TupleError};
pub use config_warning::ConfigWarning;
pub use phase::{Phase, WorkDir};
