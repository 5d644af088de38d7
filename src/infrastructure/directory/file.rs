//! File-backed directory store
//!
//! All namespaces live in a single append-only journal on disk. The first
//! line is a header carrying the format and a generation number; every later
//! line records one `put` or `delete`. A mutation:
//!
//! 1. takes the in-process mutex and an exclusive `fs2` lock on `<file>.lock`
//! 2. folds in the lines other handles appended since it last looked
//! 3. checks the expected version against that image
//! 4. appends one line and `fsync`s it
//!
//! so a write costs one line, not a rewrite of the whole store, and a `put`
//! that returned `Ok` is on disk. Once superseded lines outnumber live
//! entries two to one, the journal is compacted: the live image goes to a
//! temp file that is synced and renamed over the journal under a new
//! generation, which tells other handles to reload.
//!
//! A trailing line without its newline is an append cut short by a crash.
//! Readers skip it and the next writer truncates it.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::domain::entities::Record;
use crate::domain::ports::{check_names, DirectoryStore, StoreError, StoreResult};

/// Journal format understood by this backend
const FORMAT: u32 = 2;

/// Journals with fewer lines are never compacted
const COMPACT_MIN_LINES: usize = 256;

/// File name used by `FileDirectory::open`
pub const DEFAULT_FILE_NAME: &str = "directory.jsonl";

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    format: u32,
    generation: u64,
}

/// One journal line
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Line {
    Put {
        ns: String,
        key: String,
        version: u64,
        checksum: String,
        /// base64
        payload: String,
    },
    /// Also written for tombstones on compaction, so a recreated key keeps
    /// counting from the version it was deleted at
    Delete {
        ns: String,
        key: String,
        version: u64,
    },
}

#[derive(Debug)]
struct Stored {
    version: u64,
    checksum: String,
    payload: Vec<u8>,
}

/// In-memory image of the journal
#[derive(Debug, Default)]
struct State {
    /// Generation of the journal this image was read from; 0 before one exists
    generation: u64,
    /// Journal bytes folded into the image, header included
    offset: u64,
    /// Lines folded in after the header
    lines: usize,
    live: BTreeMap<String, BTreeMap<String, Stored>>,
    /// Last version of each deleted key
    retired: BTreeMap<String, BTreeMap<String, u64>>,
}

impl State {
    fn version_of(&self, namespace: &str, key: &str) -> Option<u64> {
        self.live
            .get(namespace)
            .and_then(|bucket| bucket.get(key))
            .map(|stored| stored.version)
    }

    fn retired_version(&self, namespace: &str, key: &str) -> u64 {
        self.retired
            .get(namespace)
            .and_then(|bucket| bucket.get(key))
            .copied()
            .unwrap_or(Record::ABSENT)
    }

    fn apply(&mut self, line: Line, path: &Path) -> StoreResult<()> {
        match line {
            Line::Put {
                ns,
                key,
                version,
                checksum,
                payload,
            } => {
                let payload =
                    STANDARD
                        .decode(payload.as_bytes())
                        .map_err(|e| StoreError::Corrupted {
                            path: path.to_path_buf(),
                            message: format!(
                                "bad payload encoding for '{}' in namespace '{}': {}",
                                key, ns, e
                            ),
                        })?;
                if let Some(bucket) = self.retired.get_mut(&ns) {
                    bucket.remove(&key);
                    if bucket.is_empty() {
                        self.retired.remove(&ns);
                    }
                }
                self.live.entry(ns).or_default().insert(
                    key,
                    Stored {
                        version,
                        checksum,
                        payload,
                    },
                );
            }
            Line::Delete { ns, key, version } => {
                if let Some(bucket) = self.live.get_mut(&ns) {
                    bucket.remove(&key);
                    if bucket.is_empty() {
                        self.live.remove(&ns);
                    }
                }
                self.retired.entry(ns).or_default().insert(key, version);
            }
        }
        self.lines += 1;
        Ok(())
    }

    /// Live entries plus tombstones
    fn entries(&self) -> usize {
        let live: usize = self.live.values().map(BTreeMap::len).sum();
        let retired: usize = self.retired.values().map(BTreeMap::len).sum();
        live + retired
    }

    /// Lines that rebuild this image from an empty journal
    fn snapshot(&self) -> Vec<Line> {
        let puts = self.live.iter().flat_map(|(ns, bucket)| {
            bucket.iter().map(move |(key, stored)| Line::Put {
                ns: ns.clone(),
                key: key.clone(),
                version: stored.version,
                checksum: stored.checksum.clone(),
                payload: STANDARD.encode(&stored.payload),
            })
        });
        let tombstones = self.retired.iter().flat_map(|(ns, bucket)| {
            bucket.iter().map(move |(key, version)| Line::Delete {
                ns: ns.clone(),
                key: key.clone(),
                version: *version,
            })
        });
        puts.chain(tombstones).collect()
    }
}

fn checksum(payload: &[u8]) -> String {
    format!("sha256:{:x}", Sha256::digest(payload))
}

/// Durable single-file directory store
pub struct FileDirectory {
    path: PathBuf,
    state: Mutex<State>,
}

impl FileDirectory {
    /// Store in `dir/directory.jsonl`, creating `dir` if needed
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        Self::with_file(dir.as_ref().join(DEFAULT_FILE_NAME))
    }

    /// Store in an explicit file, creating its parent directory if needed
    pub fn with_file(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(Self {
            path,
            state: Mutex::new(State::default()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn corrupted(&self, message: impl Into<String>) -> StoreError {
        StoreError::Corrupted {
            path: self.path.clone(),
            message: message.into(),
        }
    }

    fn lock_file(&self) -> StoreResult<(File, PathBuf)> {
        let lock_path = self.path.with_extension("lock");
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|source| StoreError::Io {
                path: lock_path.clone(),
                source,
            })?;
        Ok((file, lock_path))
    }

    /// Bring `state` up to date with the journal on disk. On error the
    /// image is dropped so the next call reloads from scratch.
    fn refresh(&self, state: &mut State) -> StoreResult<()> {
        let result = self.catch_up(state);
        if result.is_err() {
            *state = State::default();
        }
        result
    }

    fn catch_up(&self, state: &mut State) -> StoreResult<()> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                *state = State::default();
                return Ok(());
            }
            Err(e) => return Err(self.io_err(e)),
        };
        let len = file.metadata().map_err(|e| self.io_err(e))?.len();

        let mut reader = BufReader::new(file);
        let mut header = String::new();
        let header_len = reader
            .read_line(&mut header)
            .map_err(|e| self.io_err(e))? as u64;
        if header_len == 0 {
            *state = State::default();
            return Ok(());
        }
        if !header.ends_with('\n') {
            return Err(self.corrupted("journal header is incomplete"));
        }
        let header: Header = serde_json::from_str(&header)
            .map_err(|e| self.corrupted(format!("bad journal header: {}", e)))?;
        if header.format != FORMAT {
            return Err(self.corrupted(format!(
                "unsupported format {} (expected {})",
                header.format, FORMAT
            )));
        }

        if header.generation != state.generation || len < state.offset {
            *state = State {
                generation: header.generation,
                offset: header_len,
                ..State::default()
            };
        } else if state.offset > header_len {
            reader
                .seek(SeekFrom::Start(state.offset))
                .map_err(|e| self.io_err(e))?;
        }

        let mut tail = Vec::new();
        reader
            .read_to_end(&mut tail)
            .map_err(|e| self.io_err(e))?;

        let complete = tail.iter().rposition(|b| *b == b'\n').map_or(0, |i| i + 1);
        for raw in tail[..complete]
            .split(|b| *b == b'\n')
            .filter(|raw| !raw.is_empty())
        {
            let line: Line = serde_json::from_slice(raw)
                .map_err(|e| self.corrupted(format!("bad journal line: {}", e)))?;
            state.apply(line, &self.path)?;
        }
        state.offset += complete as u64;
        Ok(())
    }

    /// Run `view` against an up-to-date image under a shared lock
    fn read<R>(&self, view: impl FnOnce(&State) -> StoreResult<R>) -> StoreResult<R> {
        let mut state = self.state();
        let (lock, lock_path) = self.lock_file()?;
        FileExt::lock_shared(&lock).map_err(|source| StoreError::Io {
            path: lock_path,
            source,
        })?;

        let result = self.refresh(&mut state).and_then(|()| view(&*state));

        let _ = FileExt::unlock(&lock);
        result
    }

    /// Let `decide` pick a journal line against an up-to-date image under
    /// both locks, then append it
    fn transact<R>(
        &self,
        decide: impl FnOnce(&State) -> StoreResult<(Line, R)>,
    ) -> StoreResult<R> {
        let mut state = self.state();
        let (lock, lock_path) = self.lock_file()?;
        FileExt::lock_exclusive(&lock).map_err(|source| StoreError::Io {
            path: lock_path,
            source,
        })?;

        let result = self
            .refresh(&mut state)
            .and_then(|()| decide(&*state))
            .and_then(|(line, value)| {
                self.append(&mut *state, line)?;
                Ok(value)
            });

        let _ = FileExt::unlock(&lock);
        result
    }

    fn append(&self, state: &mut State, line: Line) -> StoreResult<()> {
        if state.generation == 0 {
            self.rewrite(state)?;
        }

        let mut bytes = serde_json::to_vec(&line).map_err(|e| self.corrupted(e.to_string()))?;
        bytes.push(b'\n');

        let mut file = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;
        // Drops a torn line left by a crashed writer
        file.set_len(state.offset).map_err(|e| self.io_err(e))?;
        file.seek(SeekFrom::Start(state.offset))
            .map_err(|e| self.io_err(e))?;
        file.write_all(&bytes).map_err(|e| self.io_err(e))?;
        file.sync_data().map_err(|e| self.io_err(e))?;

        state.offset += bytes.len() as u64;
        if let Err(err) = state.apply(line, &self.path) {
            // The line is on disk; reload it on the next call
            *state = State::default();
            return Err(err);
        }

        if state.lines >= COMPACT_MIN_LINES && state.lines > 2 * state.entries() {
            // The append above is already durable, so a failed compaction
            // only costs disk space
            if let Err(err) = self.rewrite(state) {
                warn!(path = %self.path.display(), error = %err, "Journal compaction failed");
            }
        }
        Ok(())
    }

    /// Replace the journal with one line per live entry and tombstone,
    /// under the next generation
    fn rewrite(&self, state: &mut State) -> StoreResult<()> {
        let generation = state.generation + 1;
        let lines = state.snapshot();

        let mut content = serde_json::to_vec(&Header {
            format: FORMAT,
            generation,
        })
        .map_err(|e| self.corrupted(e.to_string()))?;
        content.push(b'\n');
        for line in &lines {
            serde_json::to_writer(&mut content, line).map_err(|e| self.corrupted(e.to_string()))?;
            content.push(b'\n');
        }

        let dir = self.dir();
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| self.io_err(e))?;
        tmp.write_all(&content).map_err(|e| self.io_err(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_err(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_err(e.error))?;

        // Make the rename itself durable
        #[cfg(unix)]
        {
            File::open(dir)
                .and_then(|d| d.sync_all())
                .map_err(|e| self.io_err(e))?;
        }

        state.generation = generation;
        state.offset = content.len() as u64;
        state.lines = lines.len();
        debug!(
            path = %self.path.display(),
            generation,
            entries = lines.len(),
            "Rewrote directory journal"
        );
        Ok(())
    }
}

impl DirectoryStore for FileDirectory {
    fn put(
        &self,
        namespace: &str,
        key: &str,
        payload: &[u8],
        expected_version: u64,
    ) -> StoreResult<u64> {
        check_names(namespace, Some(key))?;

        let version = self.transact(|state| {
            let actual = state
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

            let floor = match actual {
                Record::ABSENT => state.retired_version(namespace, key),
                current => current,
            };
            let version = floor + 1;
            let line = Line::Put {
                ns: namespace.to_string(),
                key: key.to_string(),
                version,
                checksum: checksum(payload),
                payload: STANDARD.encode(payload),
            };
            Ok((line, version))
        });
        let version = version.inspect_err(|err| {
            if err.is_conflict() {
                debug!(namespace, key, expected_version, "Directory entry version conflict");
            }
        })?;

        debug!(namespace, key, version, "Stored directory entry");
        Ok(version)
    }

    fn get(&self, namespace: &str, key: &str) -> StoreResult<Record> {
        check_names(namespace, Some(key))?;

        self.read(|state| {
            let stored = state
                .live
                .get(namespace)
                .and_then(|bucket| bucket.get(key))
                .ok_or_else(|| StoreError::NotFound {
                    namespace: namespace.to_string(),
                    key: key.to_string(),
                })?;

            if checksum(&stored.payload) != stored.checksum {
                return Err(self.corrupted(format!(
                    "checksum mismatch for '{}' in namespace '{}'",
                    key, namespace
                )));
            }

            Ok(Record::new(stored.payload.clone(), stored.version))
        })
    }

    fn delete(&self, namespace: &str, key: &str, expected_version: u64) -> StoreResult<()> {
        check_names(namespace, Some(key))?;

        self.transact(|state| {
            let actual = state
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

            let line = Line::Delete {
                ns: namespace.to_string(),
                key: key.to_string(),
                version: actual,
            };
            Ok((line, ()))
        })?;

        debug!(namespace, key, "Deleted directory entry");
        Ok(())
    }

    fn list(&self, namespace: &str) -> StoreResult<Vec<String>> {
        check_names(namespace, None)?;

        self.read(|state| {
            Ok(state
                .live
                .get(namespace)
                .map(|bucket| bucket.keys().cloned().collect())
                .unwrap_or_default())
        })
    }
}
