//! Configuration warning value object.

use std::fmt;
use std::path::PathBuf;

/// Non-fatal problem found while loading a settings file.
///
/// Unknown keys do not stop loading; they are collected and handed back to
/// the caller, which decides how to surface them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    /// The unrecognized key (last path segment)
    pub key: String,
    /// The settings file it was found in
    pub file: PathBuf,
    /// 1-indexed line of the first occurrence, if it could be located
    pub line: Option<usize>,
    /// Closest recognized key, if one is within two edits
    pub suggestion: Option<String>,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown config key '{}' in {}", self.key, self.file.display())?;
        if let Some(line) = self.line {
            write!(f, ":{}", line)?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (did you mean '{}'?)", suggestion)?;
        }
        Ok(())
    }
}
