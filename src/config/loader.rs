//! Settings loading

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{DeckhandError, DeckhandResult};

use super::types::Settings;

pub use crate::domain::value_objects::ConfigWarning;

/// Environment variable overriding `compile_dir`
pub const COMPILE_DIR_VAR: &str = "DECKHAND_COMPILE_DIR";
/// Environment variable overriding `local_dir`
pub const LOCAL_DIR_VAR: &str = "DECKHAND_LOCAL_DIR";
/// Environment variable overriding `data_dir`
pub const DATA_DIR_VAR: &str = "DECKHAND_DATA_DIR";

/// Keys recognized anywhere in a settings file, for typo suggestions
const KNOWN_KEYS: &[&str] = &[
    "compile_dir",
    "local_dir",
    "data_dir",
    "store",
    "file",
    "output",
    "transcript",
    "log",
];

/// Load settings and collect non-fatal warnings (e.g. unknown keys).
pub fn load_with_warnings(path: &Path) -> DeckhandResult<(Settings, Vec<ConfigWarning>)> {
    let content = fs::read_to_string(path)?;
    parse_with_warnings(&content, path)
}

/// Parse settings text; `path` is only used for messages
pub fn parse_with_warnings(
    content: &str,
    path: &Path,
) -> DeckhandResult<(Settings, Vec<ConfigWarning>)> {
    let mut unknown_paths: Vec<String> = Vec::new();
    let deserializer = toml::de::Deserializer::new(content);

    let settings: Settings = serde_ignored::deserialize(deserializer, |p| {
        unknown_paths.push(p.to_string());
    })
    .map_err(|e| DeckhandError::InvalidSettings {
        file: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let warnings: Vec<ConfigWarning> = unknown_paths
        .into_iter()
        .map(|path_str| {
            let key = path_str
                .split('.')
                .next_back()
                .unwrap_or(path_str.as_str())
                .to_string();
            ConfigWarning {
                line: find_line_number(content, &key),
                suggestion: suggest_key(&key),
                file: path.to_path_buf(),
                key,
            }
        })
        .collect();

    debug!(
        file = %path.display(),
        warnings = warnings.len(),
        "Loaded settings"
    );
    Ok((settings, warnings))
}

/// Apply environment variable overrides (DECKHAND_* prefix)
pub fn with_env_overrides(settings: Settings) -> Settings {
    with_overrides_from(settings, |key| std::env::var(key).ok())
}

/// Apply overrides from an arbitrary variable source
pub fn with_overrides_from(
    mut settings: Settings,
    get_env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let non_empty = |key: &str| get_env(key).filter(|v| !v.trim().is_empty());

    if let Some(dir) = non_empty(COMPILE_DIR_VAR) {
        settings.compile_dir = PathBuf::from(dir);
    }
    if let Some(dir) = non_empty(LOCAL_DIR_VAR) {
        settings.local_dir = PathBuf::from(dir);
    }
    if let Some(dir) = non_empty(DATA_DIR_VAR) {
        settings.data_dir = Some(PathBuf::from(dir));
    }

    settings
}

/// First line that assigns `key` (bare or quoted) or opens a table named `key`
fn find_line_number(content: &str, key: &str) -> Option<usize> {
    let defines = |line: &str| {
        let line = line.trim_start();
        if let Some(table) = line.strip_prefix('[') {
            return table
                .trim_start_matches('[')
                .split(']')
                .next()
                .is_some_and(|name| name.trim() == key);
        }
        let rest = line.strip_prefix(key).or_else(|| {
            line.strip_prefix('"')
                .and_then(|l| l.strip_prefix(key))
                .and_then(|l| l.strip_prefix('"'))
        });
        rest.is_some_and(|rest| rest.trim_start().starts_with('='))
    };

    content.lines().position(defines).map(|i| i + 1)
}

fn suggest_key(unknown: &str) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for candidate in KNOWN_KEYS {
        let dist = levenshtein(unknown, candidate);
        best = match best {
            None => Some((candidate, dist)),
            Some((_, best_dist)) if dist < best_dist => Some((candidate, dist)),
            Some(current) => Some(current),
        };
    }

    match best {
        Some((candidate, dist)) if dist <= 2 => Some(candidate.to_string()),
        _ => None,
    }
}

/// Levenshtein distance over bytes; keys are ASCII
fn levenshtein(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }

    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev_row: Vec<usize> = (0..=b.len()).collect();
    let mut curr_row: Vec<usize> = vec![0; b.len() + 1];

    for (i, a_byte) in a.iter().enumerate() {
        curr_row[0] = i + 1;
        for (j, b_byte) in b.iter().enumerate() {
            let cost = usize::from(a_byte != b_byte);
            curr_row[j + 1] = (prev_row[j + 1] + 1)
                .min(curr_row[j] + 1)
                .min(prev_row[j] + cost);
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[b.len()]
}
