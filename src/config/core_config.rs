//! Raw core configuration
//!
//! Everything is optional here; `Core::new` validates the whole value at
//! once and reports every problem together.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::domain::entities::Descriptor;
use crate::domain::ports::{DirectoryStore, OutputSink};
use crate::error::DeckhandResult;
use crate::infrastructure::directory::FileDirectory;
use crate::infrastructure::output::{ConsoleSink, Layered, LogLayer, StoreLayer};
use crate::registry::{AppRegistry, InfraRegistry};

use super::Settings;

/// Configuration a `Core` is built from
#[derive(Default)]
pub struct CoreConfig {
    /// Parsed deployment descriptor (required)
    pub descriptor: Option<Descriptor>,
    /// Compiled-artifact directory (required, created if missing)
    pub compile_dir: Option<PathBuf>,
    /// Local runtime-state directory (required, created if missing)
    pub local_dir: Option<PathBuf>,
    /// Durable-data directory (required, created if missing)
    pub data_dir: Option<PathBuf>,
    /// Directory store (required)
    pub directory: Option<Arc<dyn DirectoryStore>>,
    /// Output sink; a console sink is used when absent
    pub sink: Option<Arc<dyn OutputSink>>,
    pub apps: AppRegistry,
    pub infrastructures: InfraRegistry,
}

impl CoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_descriptor(mut self, descriptor: Descriptor) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    pub fn with_compile_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.compile_dir = Some(dir.into());
        self
    }

    pub fn with_local_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.local_dir = Some(dir.into());
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn with_directory(mut self, directory: Arc<dyn DirectoryStore>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_apps(mut self, apps: AppRegistry) -> Self {
        self.apps = apps;
        self
    }

    pub fn with_infrastructures(mut self, infrastructures: InfraRegistry) -> Self {
        self.infrastructures = infrastructures;
        self
    }

    /// Assemble a configuration from on-disk settings.
    ///
    /// Directories resolve against `root`. The directory store is a
    /// `FileDirectory` at the configured store file, and the console sink
    /// is wrapped in the layers `[output]` enables (transcript innermost,
    /// log outermost). Registries start empty.
    pub fn from_settings(
        descriptor: Descriptor,
        settings: &Settings,
        root: &Path,
    ) -> DeckhandResult<Self> {
        let dirs = settings.resolve(root);
        let directory: Arc<dyn DirectoryStore> =
            Arc::new(FileDirectory::with_file(&dirs.store_file)?);

        let mut sink: Arc<dyn OutputSink> = Arc::new(ConsoleSink::stdio());
        if settings.output.transcript {
            sink = Arc::new(Layered::new(StoreLayer::new(Arc::clone(&directory)), sink));
        }
        if settings.output.log {
            sink = Arc::new(Layered::new(LogLayer::new("deckhand"), sink));
        }

        Ok(Self::new()
            .with_descriptor(descriptor)
            .with_compile_dir(dirs.compile_dir)
            .with_local_dir(dirs.local_dir)
            .with_data_dir(dirs.data_dir)
            .with_directory(directory)
            .with_sink(sink))
    }
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("descriptor", &self.descriptor)
            .field("compile_dir", &self.compile_dir)
            .field("local_dir", &self.local_dir)
            .field("data_dir", &self.data_dir)
            .field("directory", &self.directory.as_ref().map(|_| "<store>"))
            .field("sink", &self.sink.as_ref().map(|_| "<sink>"))
            .field("apps", &self.apps)
            .field("infrastructures", &self.infrastructures)
            .finish()
    }
}
