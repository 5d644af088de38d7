//! Configuration module for deckhand
//!
//! Two layers:
//! - `CoreConfig`: the in-memory value a `Core` is validated from
//! - `Settings`: the on-disk `deckhand.toml`, resolved in this order:
//!   1. Environment variables (DECKHAND_*)
//!   2. Settings file
//!   3. Built-in defaults

mod core_config;
mod loader;
mod types;
mod validation;

pub use crate::domain::value_objects::ConfigWarning;

pub use core_config::CoreConfig;
pub use loader::{
    parse_with_warnings, with_overrides_from, COMPILE_DIR_VAR, DATA_DIR_VAR, LOCAL_DIR_VAR,
};
pub use types::{OutputSettings, ResolvedDirs, Settings, StoreSettings};
pub use validation::{ValidationError, ValidationIssue};

pub(crate) use validation::validate;
