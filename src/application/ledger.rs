//! Run ledger
//!
//! Keeps one `RunRecord` per app tuple in the directory store. Writers race
//! through the store's optimistic versions: on a conflict the ledger re-reads
//! the record, reapplies the change and tries again, a bounded number of
//! times.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::entities::{Descriptor, Record, RunRecord};
use crate::domain::ports::{DirectoryStore, StoreError};
use crate::domain::value_objects::{AppTuple, Phase};

/// Store namespace holding run records
pub const NAMESPACE: &str = "runs";

/// Attempts made by `update` before giving up on a contended record
pub const MAX_ATTEMPTS: usize = 5;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("run record '{key}' is not valid JSON: {source}")]
    Codec {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("run record '{key}' kept changing underneath us ({attempts} attempts)")]
    Contended { key: String, attempts: usize },
}

/// Versioned run-state records backed by a directory store
#[derive(Clone)]
pub struct RunLedger {
    store: Arc<dyn DirectoryStore>,
}

impl RunLedger {
    pub fn new(store: Arc<dyn DirectoryStore>) -> Self {
        Self { store }
    }

    /// Current record for `tuple`, if a run was ever recorded
    pub fn load(&self, tuple: &AppTuple) -> Result<Option<RunRecord>, LedgerError> {
        Ok(self.read(&tuple.slug())?.map(|(record, _)| record))
    }

    /// Keys of every recorded run, sorted
    pub fn list(&self) -> Result<Vec<String>, LedgerError> {
        Ok(self.store.list(NAMESPACE)?)
    }

    /// Drop the record for `tuple`. Missing records are not an error.
    pub fn forget(&self, tuple: &AppTuple) -> Result<(), LedgerError> {
        let key = tuple.slug();
        for _ in 0..MAX_ATTEMPTS {
            let record = match self.store.get(NAMESPACE, &key) {
                Ok(record) => record,
                Err(err) if err.is_not_found() => return Ok(()),
                Err(err) => return Err(err.into()),
            };
            match self.store.delete(NAMESPACE, &key, record.version) {
                Ok(()) => return Ok(()),
                Err(err) if err.is_conflict() || err.is_not_found() => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Err(LedgerError::Contended {
            key,
            attempts: MAX_ATTEMPTS,
        })
    }

    pub fn start_phase(
        &self,
        tuple: &AppTuple,
        descriptor: &Descriptor,
        phase: Phase,
    ) -> Result<RunRecord, LedgerError> {
        self.update(tuple, descriptor, |run| run.start(phase, Utc::now()))
    }

    /// Record the end of `phase`; `error` marks it failed
    pub fn finish_phase(
        &self,
        tuple: &AppTuple,
        descriptor: &Descriptor,
        phase: Phase,
        error: Option<String>,
    ) -> Result<RunRecord, LedgerError> {
        self.update(tuple, descriptor, |run| {
            run.finish(phase, error.clone(), Utc::now())
        })
    }

    /// Apply `change` to the record for `tuple`, creating it if needed.
    ///
    /// `change` may run more than once when another writer gets in first,
    /// so it must only depend on the record it is given.
    pub fn update<F>(
        &self,
        tuple: &AppTuple,
        descriptor: &Descriptor,
        mut change: F,
    ) -> Result<RunRecord, LedgerError>
    where
        F: FnMut(&mut RunRecord),
    {
        let key = tuple.slug();
        for attempt in 1..=MAX_ATTEMPTS {
            let (mut run, version) = match self.read(&key)? {
                Some((run, version)) => (run, version),
                None => (
                    RunRecord::new(tuple.clone(), descriptor.clone()),
                    Record::ABSENT,
                ),
            };
            run.descriptor = descriptor.clone();
            change(&mut run);

            let payload = serde_json::to_vec(&run).map_err(|source| LedgerError::Codec {
                key: key.clone(),
                source,
            })?;
            match self.store.put(NAMESPACE, &key, &payload, version) {
                Ok(new_version) => {
                    debug!(key = %key, version = new_version, "Run record updated");
                    return Ok(run);
                }
                Err(err) if err.is_conflict() => {
                    warn!(key = %key, attempt, "Run record changed concurrently, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(LedgerError::Contended {
            key,
            attempts: MAX_ATTEMPTS,
        })
    }

    fn read(&self, key: &str) -> Result<Option<(RunRecord, u64)>, LedgerError> {
        let record = match self.store.get(NAMESPACE, key) {
            Ok(record) => record,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let run = serde_json::from_slice(&record.payload).map_err(|source| LedgerError::Codec {
            key: key.to_string(),
            source,
        })?;
        Ok(Some((run, record.version)))
    }
}
