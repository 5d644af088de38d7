//! Error types for deckhand
//!
//! Each subsystem owns a `thiserror` enum next to its port. `DeckhandError`
//! gathers them for callers that drive the whole core.

use std::path::PathBuf;
use thiserror::Error;

use crate::application::LedgerError;
use crate::config::ValidationError;
use crate::core::PhaseError;
use crate::domain::ports::{SinkError, StoreError};
use crate::domain::value_objects::TupleError;
use crate::registry::RegistryError;

/// Result type alias for deckhand operations
pub type DeckhandResult<T> = Result<T, DeckhandError>;

/// Main error type for deckhand operations
#[derive(Error, Debug)]
pub enum DeckhandError {
    /// Core configuration failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    /// One or more branches of a pipeline phase failed
    #[error(transparent)]
    Phase(#[from] PhaseError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Tuple(#[from] TupleError),

    /// Settings file is not valid TOML or has wrong value types
    #[error("invalid settings in {file}: {message}")]
    InvalidSettings { file: PathBuf, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
