//! Core configuration validation
//!
//! Every check runs; nothing short-circuits. The caller gets one error that
//! lists every problem, or a fully validated set of parts.

use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::domain::entities::Descriptor;
use crate::domain::ports::{DirectoryStore, OutputSink};
use crate::domain::value_objects::WorkDir;
use crate::registry::{AppRegistry, InfraRegistry};

use super::CoreConfig;

/// One failed check, tied to the option that caused it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub option: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.option, self.message)
    }
}

/// Every problem found while validating a `CoreConfig`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationError {
    issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// Whether any issue concerns `option`
    pub fn mentions(&self, option: &str) -> bool {
        self.issues.iter().any(|i| i.option == option)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.issues.len();
        write!(
            f,
            "invalid core configuration ({} problem{})",
            count,
            if count == 1 { "" } else { "s" }
        )?;
        for issue in &self.issues {
            write!(f, "\n  - {}", issue)?;
        }
        Ok(())
    }
}

/// A configuration that passed every check
pub(crate) struct Validated {
    pub descriptor: Descriptor,
    pub compile_dir: PathBuf,
    pub local_dir: PathBuf,
    pub data_dir: PathBuf,
    pub directory: Arc<dyn DirectoryStore>,
    pub sink: Option<Arc<dyn OutputSink>>,
    pub apps: AppRegistry,
    pub infrastructures: InfraRegistry,
}

#[derive(Default)]
struct Issues(Vec<ValidationIssue>);

impl Issues {
    fn push(&mut self, option: &'static str, message: impl Into<String>) {
        self.0.push(ValidationIssue {
            option,
            message: message.into(),
        });
    }
}

/// Lexical normalization: drops `.` and resolves `..` where possible
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Create `dir` if needed and prove it is writable
fn ensure_writable_dir(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    tempfile::Builder::new()
        .prefix(".deckhand-write-check")
        .tempfile_in(dir)
        .map(drop)
}

pub(crate) fn validate(config: CoreConfig) -> Result<Validated, ValidationError> {
    let CoreConfig {
        descriptor,
        compile_dir,
        local_dir,
        data_dir,
        directory,
        sink,
        apps,
        infrastructures,
    } = config;

    let mut issues = Issues::default();

    match &descriptor {
        None => issues.push("descriptor", "is required"),
        Some(descriptor) => {
            for problem in descriptor.problems() {
                issues.push("descriptor", problem);
            }
        }
    }

    let dirs = [
        (WorkDir::Compile, compile_dir.as_deref()),
        (WorkDir::Local, local_dir.as_deref()),
        (WorkDir::Data, data_dir.as_deref()),
    ];

    // Identity used for the distinctness check: canonical when the
    // directory could be created, lexical otherwise
    let mut identities: Vec<(WorkDir, &Path, PathBuf)> = Vec::new();
    for (which, path) in dirs {
        let option = which.option_name();
        match path {
            None => issues.push(option, "is required"),
            Some(path) if path.as_os_str().is_empty() => issues.push(option, "must not be empty"),
            Some(path) => {
                let identity = match ensure_writable_dir(path) {
                    Ok(()) => fs::canonicalize(path).unwrap_or_else(|_| normalize(path)),
                    Err(err) => {
                        issues.push(
                            option,
                            format!(
                                "cannot create or write directory {}: {}",
                                path.display(),
                                err
                            ),
                        );
                        normalize(path)
                    }
                };
                identities.push((which, path, identity));
            }
        }
    }

    for (i, (first, first_path, first_id)) in identities.iter().enumerate() {
        for (second, _, second_id) in identities.iter().skip(i + 1) {
            if first_id == second_id {
                issues.push(
                    second.option_name(),
                    format!(
                        "must differ from {} (both point to {})",
                        first.option_name(),
                        first_path.display()
                    ),
                );
            }
        }
    }

    if directory.is_none() {
        issues.push("directory", "a directory store is required");
    }

    match (descriptor, compile_dir, local_dir, data_dir, directory) {
        (Some(descriptor), Some(compile_dir), Some(local_dir), Some(data_dir), Some(directory))
            if issues.0.is_empty() =>
        {
            Ok(Validated {
                descriptor,
                compile_dir,
                local_dir,
                data_dir,
                directory,
                sink,
                apps,
                infrastructures,
            })
        }
        _ => Err(ValidationError::new(issues.0)),
    }
}
