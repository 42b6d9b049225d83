//! Engine Module
//!
//! Optimistic concurrency over the document store.
//!
//! ## Responsibilities
//! - Version-checked commits: a write lands only if the caller's expected
//!   version matches the stored one
//! - Conflicts return the current state so the client can rebase and retry
//! - Every read and write runs inside the key's critical section
//!
//! There is no merging. The last committer with a matching version wins.

use std::path::Path;

use crate::config::Config;
use crate::error::Result;
use crate::key::DocumentKey;
use crate::lock::KeyLockManager;
use crate::store::{Document, DocumentStore, WriterInfo};

/// Result of a `get`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub version: u64,

    /// `None` when the caller already holds this version
    pub data: Option<String>,
}

/// Result of a `set`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetOutcome {
    /// The write was stored as `version`
    Committed { version: u64 },

    /// The expected version did not match. Carries the current state,
    /// or nothing if the document does not exist yet.
    Conflict {
        data: Option<String>,
        version: Option<u64>,
    },
}

impl SetOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, SetOutcome::Committed { .. })
    }
}

/// The document sync engine
///
/// ## Concurrency Model: per-key serialization
///
/// - `get` and `set` both take the key's lock from `locks`
///   (a read may restore a backup, which must not interleave with a write)
/// - Different keys run fully in parallel
pub struct Engine {
    store: DocumentStore,
    locks: KeyLockManager,
}

impl Engine {
    /// Open or create an engine over `config.data_dir`
    pub fn open(config: &Config) -> Result<Self> {
        let store = DocumentStore::open(&config.data_dir, config.fsync_writes)?;

        tracing::debug!(root = %config.data_dir.display(), "Document store opened");

        Ok(Self {
            store,
            locks: KeyLockManager::new(),
        })
    }

    /// Open with a path (convenience method)
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open(&config)
    }

    /// Fetch the current version of `key`
    ///
    /// Returns `Ok(None)` if nothing was ever written. `data` is included
    /// unless `known` equals the current version.
    pub fn get(&self, key: &DocumentKey, known: Option<u64>) -> Result<Option<Snapshot>> {
        self.locks.with_key_lock(key, || {
            let Some(document) = self.store.read(key)? else {
                return Ok(None);
            };

            let data = if known == Some(document.version) {
                None
            } else {
                Some(document.data)
            };

            Ok(Some(Snapshot {
                version: document.version,
                data,
            }))
        })
    }

    /// Store `data` under `key` if `expected` matches the stored version
    ///
    /// - No document: `expected` must be `None`; commits version 1
    /// - Document exists: `expected` must equal its version; commits version + 1
    /// - Anything else is a conflict and leaves the file untouched
    pub fn set(
        &self,
        key: &DocumentKey,
        data: String,
        expected: Option<u64>,
        writer_info: Option<WriterInfo>,
    ) -> Result<SetOutcome> {
        self.locks.with_key_lock(key, || {
            let current = self.store.read(key)?;

            let next = match (current, expected) {
                (None, None) => Document::first(data, writer_info),
                (None, Some(expected)) => {
                    tracing::debug!(%key, expected, "Set rejected: document does not exist");
                    return Ok(SetOutcome::Conflict {
                        data: None,
                        version: None,
                    });
                }
                (Some(current), Some(expected)) if expected == current.version => {
                    current.next(data, writer_info)
                }
                (Some(current), expected) => {
                    tracing::debug!(
                        %key,
                        expected = ?expected,
                        current = current.version,
                        "Set rejected: version mismatch"
                    );
                    return Ok(SetOutcome::Conflict {
                        version: Some(current.version),
                        data: Some(current.data),
                    });
                }
            };

            self.store.write(key, &next)?;

            tracing::debug!(%key, version = next.version, "Document committed");
            Ok(SetOutcome::Committed {
                version: next.version,
            })
        })
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the underlying store
    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Get the lock manager
    pub fn locks(&self) -> &KeyLockManager {
        &self.locks
    }
}
