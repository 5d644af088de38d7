//! DirectoryStore port - durable, versioned key/value persistence
//!
//! Run state and lookup records live here. Entries are grouped in
//! namespaces and every write is guarded by an expected version, so two
//! writers racing on the same key cannot silently overwrite each other.

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::entities::Record;

/// Result type for directory store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Directory store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// The (namespace, key) pair has never been written or was deleted
    #[error("no entry for '{key}' in namespace '{namespace}'")]
    NotFound { namespace: String, key: String },

    /// The stored version differs from the caller's expectation.
    /// Re-read the entry and retry.
    #[error(
        "version conflict on '{key}' in namespace '{namespace}': expected {expected}, found {actual}"
    )]
    VersionConflict {
        namespace: String,
        key: String,
        expected: u64,
        actual: u64,
    },

    #[error("invalid {what} '{name}': must be non-empty")]
    InvalidName { what: &'static str, name: String },

    #[error("directory store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("directory store corrupted at {path}: {message}")]
    Corrupted { path: PathBuf, message: String },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::VersionConflict { .. })
    }
}

/// Abstract directory store
///
/// Implementations:
/// - `FileDirectory` - single-file durable journal on local disk
/// - `MemoryDirectory` - in-memory, for tests
///
/// All calls are blocking. A successful `put` or `delete` must be durable
/// before it returns.
pub trait DirectoryStore: Send + Sync {
    /// Write `payload` if the stored version equals `expected_version`.
    ///
    /// Pass `Record::ABSENT` (0) to create a key that must not exist yet.
    /// Returns the new version. A key recreated after a delete continues
    /// from the version it was deleted at, so a writer still holding a
    /// version from before the delete always conflicts.
    fn put(
        &self,
        namespace: &str,
        key: &str,
        payload: &[u8],
        expected_version: u64,
    ) -> StoreResult<u64>;

    /// Read the payload and its current version
    fn get(&self, namespace: &str, key: &str) -> StoreResult<Record>;

    /// Remove a key if the stored version equals `expected_version`
    fn delete(&self, namespace: &str, key: &str, expected_version: u64) -> StoreResult<()>;

    /// Keys in `namespace`, sorted. An unknown namespace lists as empty.
    fn list(&self, namespace: &str) -> StoreResult<Vec<String>>;
}

impl<T: DirectoryStore + ?Sized> DirectoryStore for std::sync::Arc<T> {
    fn put(
        &self,
        namespace: &str,
        key: &str,
        payload: &[u8],
        expected_version: u64,
    ) -> StoreResult<u64> {
        (**self).put(namespace, key, payload, expected_version)
    }

    fn get(&self, namespace: &str, key: &str) -> StoreResult<Record> {
        (**self).get(namespace, key)
    }

    fn delete(&self, namespace: &str, key: &str, expected_version: u64) -> StoreResult<()> {
        (**self).delete(namespace, key, expected_version)
    }

    fn list(&self, namespace: &str) -> StoreResult<Vec<String>> {
        (**self).list(namespace)
    }
}

/// Reject empty namespace or key names before touching a backend
pub fn check_names(namespace: &str, key: Option<&str>) -> StoreResult<()> {
    if namespace.trim().is_empty() {
        return Err(StoreError::InvalidName {
            what: "namespace",
            name: namespace.to_string(),
        });
    }
    if let Some(key) = key {
        if key.trim().is_empty() {
            return Err(StoreError::InvalidName {
                what: "key",
                name: key.to_string(),
            });
        }
    }
    Ok(())
}

/// A view of a store limited to one namespace
///
/// Plugins receive this instead of the whole store so they cannot read or
/// clobber each other's state.
pub struct ScopedStore<'a> {
    store: &'a dyn DirectoryStore,
    namespace: String,
}

impl<'a> ScopedStore<'a> {
    pub fn new(store: &'a dyn DirectoryStore, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn put(&self, key: &str, payload: &[u8], expected_version: u64) -> StoreResult<u64> {
        self.store
            .put(&self.namespace, key, payload, expected_version)
    }

    pub fn get(&self, key: &str) -> StoreResult<Record> {
        self.store.get(&self.namespace, key)
    }

    pub fn delete(&self, key: &str, expected_version: u64) -> StoreResult<()> {
        self.store.delete(&self.namespace, key, expected_version)
    }

    pub fn list(&self) -> StoreResult<Vec<String>> {
        self.store.list(&self.namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display() {
        let err = StoreError::VersionConflict {
            namespace: "runs".into(),
            key: "web".into(),
            expected: 1,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "version conflict on 'web' in namespace 'runs': expected 1, found 3"
        );
        assert!(err.is_conflict());
        assert!(!err.is_not_found());
    }

    #[test]
    fn check_names_rejects_blank() {
        assert!(check_names("runs", Some("a")).is_ok());
        assert!(check_names("runs", None).is_ok());
        assert!(matches!(
            check_names("", None),
            Err(StoreError::InvalidName {
                what: "namespace",
                ..
            })
        ));
        assert!(matches!(
            check_names("runs", Some(" ")),
            Err(StoreError::InvalidName { what: "key", .. })
        ));
    }
}
