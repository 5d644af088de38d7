//! Home directory resolution with test isolation support.
//!
//! `dirs::home_dir()` ignores `HOME` on some platforms, so tests that need
//! an isolated home set `DECKHAND_HOME` instead. Every internal path that
//! hangs off the home directory (default data dir, `~` in settings) goes
//! through `deckhand_home_dir()`.

use std::path::{Path, PathBuf};

/// Environment variable that overrides the home directory
pub const DECKHAND_HOME_VAR: &str = "DECKHAND_HOME";

/// Home directory for deckhand-internal paths
pub fn deckhand_home_dir() -> Option<PathBuf> {
    std::env::var(DECKHAND_HOME_VAR)
        .ok()
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
}

/// Default durable-data directory (`~/.deckhand/data`)
pub fn default_data_dir() -> PathBuf {
    deckhand_home_dir()
        .map(|home| home.join(".deckhand").join("data"))
        .unwrap_or_else(|| PathBuf::from(".deckhand/data"))
}

/// Expand a leading `~` using `home`
pub fn expand_home_with(path: &Path, home: Option<&Path>) -> PathBuf {
    let Some(home) = home else {
        return path.to_path_buf();
    };
    match path.strip_prefix("~") {
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Expand a leading `~` with the deckhand home directory
pub fn expand_home(path: &Path) -> PathBuf {
    expand_home_with(path, deckhand_home_dir().as_deref())
}
