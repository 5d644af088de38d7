//! Settings type definitions

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::DeckhandResult;
use crate::infrastructure::directory::DEFAULT_FILE_NAME;
use crate::infrastructure::home;

use super::loader::{self, ConfigWarning};

/// Directory store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Store file, relative to the data directory unless absolute
    #[serde(default = "default_store_file")]
    pub file: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            file: default_store_file(),
        }
    }
}

fn default_store_file() -> PathBuf {
    PathBuf::from(DEFAULT_FILE_NAME)
}

/// Output sink settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Record every message in the directory store
    #[serde(default = "default_true")]
    pub transcript: bool,

    /// Mirror every message into the tracing log
    #[serde(default = "default_true")]
    pub log: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            transcript: true,
            log: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// On-disk settings (`deckhand.toml`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_compile_dir")]
    pub compile_dir: PathBuf,

    #[serde(default = "default_local_dir")]
    pub local_dir: PathBuf,

    /// Defaults to `~/.deckhand/data`
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub output: OutputSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            compile_dir: default_compile_dir(),
            local_dir: default_local_dir(),
            data_dir: None,
            store: StoreSettings::default(),
            output: OutputSettings::default(),
        }
    }
}

fn default_compile_dir() -> PathBuf {
    PathBuf::from(".deckhand/compiled")
}

fn default_local_dir() -> PathBuf {
    PathBuf::from(".deckhand/local")
}

/// Working directories after `~` expansion and resolution against a root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDirs {
    pub compile_dir: PathBuf,
    pub local_dir: PathBuf,
    pub data_dir: PathBuf,
    pub store_file: PathBuf,
}

impl Settings {
    /// Load settings from a file, ignoring unknown keys
    pub fn load(path: &Path) -> DeckhandResult<Self> {
        Self::load_with_warnings(path).map(|(settings, _)| settings)
    }

    /// Load settings and report unknown keys
    pub fn load_with_warnings(path: &Path) -> DeckhandResult<(Self, Vec<ConfigWarning>)> {
        loader::load_with_warnings(path)
    }

    /// Apply `DECKHAND_*` environment overrides
    pub fn with_env_overrides(self) -> Self {
        loader::with_env_overrides(self)
    }

    /// Resolve every directory against `root`
    pub fn resolve(&self, root: &Path) -> ResolvedDirs {
        let resolve = |path: &Path| {
            let expanded = home::expand_home(path);
            if expanded.is_absolute() {
                expanded
            } else {
                root.join(expanded)
            }
        };

        let data_dir = match &self.data_dir {
            Some(dir) => resolve(dir),
            None => home::default_data_dir(),
        };
        let store_file = if self.store.file.is_absolute() {
            self.store.file.clone()
        } else {
            data_dir.join(&self.store.file)
        };

        ResolvedDirs {
            compile_dir: resolve(&self.compile_dir),
            local_dir: resolve(&self.local_dir),
            data_dir,
            store_file,
        }
    }
}
