//! The validated runtime
//!
//! A `Core` is built once per run from a `CoreConfig`. It owns the two
//! plugin registries and the directory store, and is what pipeline code
//! talks to: resolve a plugin, find a working directory, run a phase.
//!
//! `Core` is `Sync`; every method takes `&self`, so one instance can be
//! shared by concurrent pipeline workers.

mod pipeline;

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::application::RunLedger;
use crate::config::{validate, CoreConfig, ValidationError, ValidationIssue};
use crate::domain::entities::Descriptor;
use crate::domain::ports::{App, DirectoryStore, Infrastructure, OutputSink, ScopedStore};
use crate::domain::value_objects::{AppTuple, WorkDir};
use crate::infrastructure::output::ConsoleSink;
use crate::registry::{AppRegistry, InfraRegistry, RegistryError};

pub use pipeline::{BranchFailure, PhaseError, Stage};

pub struct Core {
    descriptor: Descriptor,
    tuple: AppTuple,
    compile_dir: PathBuf,
    local_dir: PathBuf,
    data_dir: PathBuf,
    directory: Arc<dyn DirectoryStore>,
    sink: Arc<dyn OutputSink>,
    apps: AppRegistry,
    infrastructures: InfraRegistry,
    ledger: RunLedger,
}

impl Core {
    /// Validate `config` and build the runtime.
    ///
    /// Every check runs before this returns, so a failure lists all the
    /// problems at once. The working directories are created on disk as a
    /// side effect. No plugin is constructed here.
    pub fn new(config: CoreConfig) -> Result<Self, ValidationError> {
        let validated = validate(config)?;

        let tuple = validated.descriptor.app_tuple().map_err(|err| {
            ValidationError::new(vec![ValidationIssue {
                option: "descriptor",
                message: err.to_string(),
            }])
        })?;

        let sink = match validated.sink {
            Some(sink) => sink,
            None => {
                debug!("No output sink configured, using the console");
                Arc::new(ConsoleSink::stdio()) as Arc<dyn OutputSink>
            }
        };

        info!(
            tuple = %tuple,
            compile_dir = %validated.compile_dir.display(),
            local_dir = %validated.local_dir.display(),
            data_dir = %validated.data_dir.display(),
            "Core ready"
        );

        Ok(Self {
            ledger: RunLedger::new(Arc::clone(&validated.directory)),
            descriptor: validated.descriptor,
            tuple,
            compile_dir: validated.compile_dir,
            local_dir: validated.local_dir,
            data_dir: validated.data_dir,
            directory: validated.directory,
            sink,
            apps: validated.apps,
            infrastructures: validated.infrastructures,
        })
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Plugin key the descriptor selects
    pub fn app_tuple(&self) -> &AppTuple {
        &self.tuple
    }

    /// Application plugin registered for exactly `tuple`
    pub fn resolve_app(&self, tuple: &AppTuple) -> Result<Arc<dyn App>, RegistryError> {
        self.apps.resolve(tuple)
    }

    /// Infrastructure plugin registered under the type name `name`
    pub fn resolve_infra(&self, name: &str) -> Result<Arc<dyn Infrastructure>, RegistryError> {
        self.infrastructures.resolve(name)
    }

    /// Application plugin for the descriptor's own tuple
    pub fn app(&self) -> Result<Arc<dyn App>, RegistryError> {
        self.resolve_app(&self.tuple)
    }

    pub fn working_dir(&self, which: WorkDir) -> &Path {
        match which {
            WorkDir::Compile => &self.compile_dir,
            WorkDir::Local => &self.local_dir,
            WorkDir::Data => &self.data_dir,
        }
    }

    pub fn compile_dir(&self) -> &Path {
        &self.compile_dir
    }

    pub fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn directory(&self) -> &Arc<dyn DirectoryStore> {
        &self.directory
    }

    /// A store view limited to `namespace`
    pub fn scoped_store(&self, namespace: impl Into<String>) -> ScopedStore<'_> {
        ScopedStore::new(self.directory.as_ref(), namespace)
    }

    pub fn sink(&self) -> &Arc<dyn OutputSink> {
        &self.sink
    }

    /// Application registry; factories may still be replaced until a key
    /// is first resolved
    pub fn apps(&self) -> &AppRegistry {
        &self.apps
    }

    pub fn infrastructures(&self) -> &InfraRegistry {
        &self.infrastructures
    }

    pub fn ledger(&self) -> &RunLedger {
        &self.ledger
    }
}
