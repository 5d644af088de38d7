//! Deckhand - orchestration core for a plugin-driven deployment tool
//!
//! A deployment descriptor names an application type and the
//! infrastructure it targets. Deckhand resolves the application and
//! infrastructure plugins registered for those selectors, drives the
//! compile, infra, build and deploy phases through dedicated working
//! directories, and keeps run state in a durable, versioned directory store
//! so a run can be resumed after a restart.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use deckhand::domain::entities::{Descriptor, InfrastructureDecl};
//! use deckhand::domain::value_objects::Phase;
//! use deckhand::infrastructure::FileDirectory;
//! use deckhand::{Core, CoreConfig};
//!
//! # fn main() -> anyhow::Result<()> {
//! let descriptor =
//!     Descriptor::single("shop", "web", InfrastructureDecl::new("prod", "cloudX", "small"));
//! let config = CoreConfig::new()
//!     .with_descriptor(descriptor)
//!     .with_compile_dir(".deckhand/compiled")
//!     .with_local_dir(".deckhand/local")
//!     .with_data_dir(".deckhand/data")
//!     .with_directory(Arc::new(FileDirectory::open(".deckhand/data")?));
//!
//! let core = Core::new(config)?;
//! core.run(Phase::Compile)?;
//! # Ok(())
//! # }
//! ```

pub mod application;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod registry;
pub mod testing;

// Re-exports for convenience
pub use crate::application::{LedgerError, RunLedger};
pub use crate::config::{CoreConfig, Settings, ValidationError, ValidationIssue};
pub use crate::core::{BranchFailure, Core, PhaseError, Stage};
pub use crate::domain::entities::Descriptor;
pub use crate::domain::ports::{App, DirectoryStore, Infrastructure, OutputSink};
pub use crate::domain::value_objects::{AppTuple, Phase, WorkDir};
pub use crate::error::{DeckhandError, DeckhandResult};
pub use crate::registry::{AppRegistry, Factory, InfraRegistry, Registry, RegistryError};
