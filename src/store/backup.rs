//! Backup protocol
//!
//! Two-phase rename that keeps readers from seeing a partially written file.
//!
//! A write is three steps:
//! 1. [`stage_backup`]: rename the current primary to `<path>.backup`
//! 2. [`write_primary`]: write the new document to the primary path
//! 3. [`discard_backup`]: remove `<path>.backup`
//!
//! Every read first calls [`recover_from_backup`], which moves a leftover
//! backup over the primary. A crash between steps 2 and 3 therefore rolls
//! the key back to the previous document even though the new one was fully
//! written. That loss is part of the protocol: the only state the next
//! reader can trust is the backup.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Suffix appended to a primary path to form its backup path
pub const BACKUP_SUFFIX: &str = ".backup";

/// `<path>.backup`
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Run all three write steps for `path`
pub fn commit_with_backup(path: &Path, bytes: &[u8], fsync: bool) -> Result<()> {
    stage_backup(path)?;
    write_primary(path, bytes, fsync)?;
    discard_backup(path)?;
    Ok(())
}

/// Step 1: move the current primary aside, replacing any stale backup.
///
/// Returns `false` when there was no primary to move.
pub fn stage_backup(path: &Path) -> Result<bool> {
    match fs::rename(path, backup_path(path)) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Step 2: write the serialized document to the primary path
pub fn write_primary(path: &Path, bytes: &[u8], fsync: bool) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    if fsync {
        file.sync_all()?;
    }
    Ok(())
}

/// Step 3: drop the backup. A missing backup (first write) is fine.
pub fn discard_backup(path: &Path) -> Result<()> {
    match fs::remove_file(backup_path(path)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Roll back an interrupted write by moving the backup over the primary.
///
/// Returns `true` if a backup was found and restored.
pub fn recover_from_backup(path: &Path) -> Result<bool> {
    let backup = backup_path(path);
    match fs::rename(&backup, path) {
        Ok(()) => {
            tracing::warn!(
                path = %path.display(),
                "Restored document from backup left by an interrupted write"
            );
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
