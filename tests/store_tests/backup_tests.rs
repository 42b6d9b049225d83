//! Tests for the backup protocol
//!
//! These tests verify:
//! - Each write step in isolation
//! - Recovery on read after a crash at every point of a write
//! - The rollback of a completed write whose backup was never removed

use std::fs;

use keysync::key::DocumentKey;
use keysync::store::backup::{
    backup_path, commit_with_backup, discard_backup, recover_from_backup, stage_backup,
    write_primary,
};
use keysync::store::{Document, DocumentStore};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup() -> (TempDir, DocumentStore, DocumentKey) {
    let temp_dir = TempDir::new().unwrap();
    let store = DocumentStore::open(temp_dir.path(), false).unwrap();
    let key = DocumentKey::parse(None, &"7e".repeat(32)).unwrap();
    (temp_dir, store, key)
}

fn doc(data: &str, version: u64) -> Document {
    Document {
        data: data.to_string(),
        version,
        created: 1,
        updated: (version > 1).then_some(2),
        writer_info: None,
    }
}

fn bytes(document: &Document) -> Vec<u8> {
    serde_json::to_vec(document).unwrap()
}

// =============================================================================
// Step Tests
// =============================================================================

#[test]
fn test_backup_path_appends_suffix() {
    let (temp, _store, _key) = setup();
    let path = temp.path().join("ab").join("x.json");

    assert_eq!(backup_path(&path), temp.path().join("ab").join("x.json.backup"));
}

#[test]
fn test_stage_backup_without_primary() {
    let (temp, _store, _key) = setup();
    let path = temp.path().join("missing.json");

    assert!(!stage_backup(&path).unwrap());
    assert!(!backup_path(&path).exists());
}

#[test]
fn test_stage_backup_overwrites_stale_backup() {
    let (temp, _store, _key) = setup();
    let path = temp.path().join("doc.json");

    fs::write(backup_path(&path), b"stale").unwrap();
    fs::write(&path, b"current").unwrap();

    assert!(stage_backup(&path).unwrap());
    assert!(!path.exists());
    assert_eq!(fs::read(backup_path(&path)).unwrap(), b"current");
}

#[test]
fn test_discard_backup_is_idempotent() {
    let (temp, _store, _key) = setup();
    let path = temp.path().join("doc.json");

    discard_backup(&path).unwrap();
    fs::write(backup_path(&path), b"x").unwrap();
    discard_backup(&path).unwrap();
    discard_backup(&path).unwrap();

    assert!(!backup_path(&path).exists());
}

#[test]
fn test_commit_with_backup_replaces_primary() {
    let (temp, _store, _key) = setup();
    let path = temp.path().join("doc.json");

    commit_with_backup(&path, b"first", true).unwrap();
    commit_with_backup(&path, b"second", true).unwrap();

    assert_eq!(fs::read(&path).unwrap(), b"second");
    assert!(!backup_path(&path).exists());
}

#[test]
fn test_recover_without_backup_is_noop() {
    let (temp, _store, _key) = setup();
    let path = temp.path().join("doc.json");
    fs::write(&path, b"kept").unwrap();

    assert!(!recover_from_backup(&path).unwrap());
    assert_eq!(fs::read(&path).unwrap(), b"kept");
}

// =============================================================================
// Crash Simulation Tests
// =============================================================================

#[test]
fn test_crash_after_stage_restores_previous() {
    let (_temp, store, key) = setup();
    store.write(&key, &doc("v1", 1)).unwrap();
    let path = store.path_for(&key);

    // Crash right after step 1: only the backup exists
    stage_backup(&path).unwrap();
    assert!(!path.exists());

    assert_eq!(store.read(&key).unwrap(), Some(doc("v1", 1)));
    assert!(!backup_path(&path).exists());
}

#[test]
fn test_crash_during_primary_write_restores_previous() {
    let (_temp, store, key) = setup();
    store.write(&key, &doc("v1", 1)).unwrap();
    let path = store.path_for(&key);

    // Crash halfway through step 2: truncated primary next to the backup
    stage_backup(&path).unwrap();
    let full = bytes(&doc("v2", 2));
    write_primary(&path, &full[..full.len() / 2], false).unwrap();

    assert_eq!(store.read(&key).unwrap(), Some(doc("v1", 1)));
}

#[test]
fn test_crash_before_backup_removal_discards_completed_write() {
    let (_temp, store, key) = setup();
    store.write(&key, &doc("v1", 1)).unwrap();
    let path = store.path_for(&key);

    // Steps 1 and 2 complete, step 3 never runs
    stage_backup(&path).unwrap();
    write_primary(&path, &bytes(&doc("v2", 2)), true).unwrap();

    // The fully written v2 is rolled back on the next read
    assert_eq!(store.read(&key).unwrap(), Some(doc("v1", 1)));
    assert!(!backup_path(&path).exists());

    // And the rollback is durable
    assert_eq!(store.read(&key).unwrap(), Some(doc("v1", 1)));
}

#[test]
fn test_crash_on_first_write_leaves_new_document() {
    let (_temp, store, key) = setup();
    let path = store.path_for(&key);
    fs::create_dir_all(path.parent().unwrap()).unwrap();

    // No primary to back up, so there is nothing to roll back to
    assert!(!stage_backup(&path).unwrap());
    write_primary(&path, &bytes(&doc("v1", 1)), false).unwrap();

    assert_eq!(store.read(&key).unwrap(), Some(doc("v1", 1)));
}
