//! Document Store
//!
//! Maps document keys to files under the storage root and runs the backup
//! protocol around every read and write.
//!
//! The store does no locking of its own. Callers serialize access per key
//! (see [`crate::lock::KeyLockManager`]); a read racing a write on the same
//! key could otherwise restore a backup mid-write.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::key::DocumentKey;

use super::backup;
use super::Document;

/// File-per-document store
pub struct DocumentStore {
    /// Storage root directory
    root: PathBuf,

    /// fsync each primary file after writing it
    fsync: bool,
}

impl DocumentStore {
    /// File extension of document files
    const EXTENSION: &'static str = "json";

    /// Open or create a store rooted at `path`
    pub fn open(path: &Path, fsync: bool) -> Result<Self> {
        fs::create_dir_all(path)?;

        Ok(Self {
            root: path.to_path_buf(),
            fsync,
        })
    }

    /// Read the document stored under `key`
    ///
    /// Returns:
    /// - `Ok(Some(doc))`: document exists
    /// - `Ok(None)`: nothing was ever written for this key
    pub fn read(&self, key: &DocumentKey) -> Result<Option<Document>> {
        let path = self.path_for(key);

        backup::recover_from_backup(&path)?;

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Replace the document stored under `key`
    pub fn write(&self, key: &DocumentKey, document: &Document) -> Result<()> {
        let path = self.path_for(key);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let bytes = serde_json::to_vec(document)?;
        backup::commit_with_backup(&path, &bytes, self.fsync)?;

        tracing::trace!(%key, version = document.version, bytes = bytes.len(), "Document written");
        Ok(())
    }

    /// Primary file path for a key:
    /// `{root}[/{bucket}]/{ref[0..2]}/{ref}.json`
    pub fn path_for(&self, key: &DocumentKey) -> PathBuf {
        let mut path = self.root.clone();
        if let Some(bucket) = key.bucket() {
            path.push(bucket.as_str());
        }
        path.push(key.reference().shard());
        path.push(format!("{}.{}", key.reference(), Self::EXTENSION));
        path
    }

    /// Get the storage root
    pub fn root(&self) -> &Path {
        &self.root
    }
}
