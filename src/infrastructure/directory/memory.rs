//! In-memory directory store
//!
//! Same contract as `FileDirectory` without durability. Useful for tests
//! and for dry runs where nothing should be written to disk.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::entities::Record;
use crate::domain::ports::{check_names, DirectoryStore, StoreError, StoreResult};

#[derive(Debug, Default)]
struct Buckets {
    live: BTreeMap<String, BTreeMap<String, Record>>,
    /// Last version of each deleted key
    retired: BTreeMap<(String, String), u64>,
}

impl Buckets {
    fn version_of(&self, namespace: &str, key: &str) -> Option<u64> {
        self.live
            .get(namespace)
            .and_then(|bucket| bucket.get(key))
            .map(|r| r.version)
    }
}

#[derive(Debug, Default)]
pub struct MemoryDirectory {
    buckets: Mutex<Buckets>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn buckets(&self) -> MutexGuard<'_, Buckets> {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DirectoryStore for MemoryDirectory {
    fn put(
        &self,
        namespace: &str,
        key: &str,
        payload: &[u8],
        expected_version: u64,
    ) -> StoreResult<u64> {
        check_names(namespace, Some(key))?;

        let mut buckets = self.buckets();
        let actual = buckets
            .version_of(namespace, key)
            .unwrap_or(Record::ABSENT);
        if actual != expected_version {
            return Err(StoreError::VersionConflict {
                namespace: namespace.to_string(),
                key: key.to_string(),
                expected: expected_version,
                actual,
            });
        }

        let id = (namespace.to_string(), key.to_string());
        let floor = match actual {
            Record::ABSENT => buckets.retired.remove(&id).unwrap_or(Record::ABSENT),
            current => current,
        };
        let version = floor + 1;
        buckets
            .live
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), Record::new(payload.to_vec(), version));
        Ok(version)
    }

    fn get(&self, namespace: &str, key: &str) -> StoreResult<Record> {
        check_names(namespace, Some(key))?;

        self.buckets()
            .live
            .get(namespace)
            .and_then(|bucket| bucket.get(key))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                namespace: namespace.to_string(),
                key: key.to_string(),
            })
    }

    fn delete(&self, namespace: &str, key: &str, expected_version: u64) -> StoreResult<()> {
        check_names(namespace, Some(key))?;

        let mut buckets = self.buckets();
        let actual = buckets
            .version_of(namespace, key)
            .ok_or_else(|| StoreError::NotFound {
                namespace: namespace.to_string(),
                key: key.to_string(),
            })?;
        if actual != expected_version {
            return Err(StoreError::VersionConflict {
                namespace: namespace.to_string(),
                key: key.to_string(),
                expected: expected_version,
                actual,
            });
        }

        if let Some(bucket) = buckets.live.get_mut(namespace) {
            bucket.remove(key);
            if bucket.is_empty() {
                buckets.live.remove(namespace);
            }
        }
        buckets
            .retired
            .insert((namespace.to_string(), key.to_string()), actual);
        Ok(())
    }

    fn list(&self, namespace: &str) -> StoreResult<Vec<String>> {
        check_names(namespace, None)?;

        Ok(self
            .buckets()
            .live
            .get(namespace)
            .map(|bucket| bucket.keys().cloned().collect())
            .unwrap_or_default())
    }
}
