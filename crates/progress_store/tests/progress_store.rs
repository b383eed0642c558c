use std::path::PathBuf;

use progress_store::{progress_file, ProgressStore, PROGRESS_VERSION};
use serde_json::json;
use tempfile::TempDir;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

fn store_path() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let path = dir.path().join("progress.json");
    (dir, path)
}

fn seeded_document(conversations: serde_json::Value) -> String {
    json!({
        "version": 1,
        "conversations": conversations,
    })
    .to_string()
}

#[test]
fn missing_document_reads_as_empty_history() {
    let (_dir, path) = store_path();
    let store = ProgressStore::open(&path);

    assert_eq!(store.last_processed("chat-1"), None);
}

#[test]
fn record_then_load_round_trips_per_conversation() {
    let (_dir, path) = store_path();
    let mut store = ProgressStore::open(&path);

    store
        .record("chat-1", "m42")
        .expect("record should persist the id");

    assert_eq!(store.last_processed("chat-1"), Some("m42"));
    assert_eq!(store.last_processed("chat-2"), None);
}

#[test]
fn record_overwrites_the_previous_entry() {
    let (_dir, path) = store_path();
    let mut store = ProgressStore::open(&path);

    store.record("chat-1", "m1").expect("first record");
    store.record("chat-1", "m2").expect("second record");

    assert_eq!(store.last_processed("chat-1"), Some("m2"));
}

#[test]
fn recorded_progress_survives_reopen() {
    let (_dir, path) = store_path();

    let mut store = ProgressStore::open(&path);
    store.record("chat-1", "m42").expect("record should persist");
    drop(store);

    let reopened = ProgressStore::open(&path);
    assert_eq!(reopened.last_processed("chat-1"), Some("m42"));
}

#[test]
fn document_on_disk_is_versioned_with_an_rfc3339_stamp() {
    let (_dir, path) = store_path();
    let mut store = ProgressStore::open(&path);
    store.record("chat-1", "m42").expect("record should persist");

    let raw = std::fs::read_to_string(&path).expect("document should be readable");
    let parsed: serde_json::Value = serde_json::from_str(&raw).expect("document should be JSON");

    assert_eq!(parsed["version"], PROGRESS_VERSION);
    assert_eq!(parsed["conversations"]["chat-1"]["last_message_id"], "m42");

    let saved_at = parsed["conversations"]["chat-1"]["saved_at"]
        .as_str()
        .expect("saved_at should be a string");
    OffsetDateTime::parse(saved_at, &Rfc3339).expect("saved_at should parse as RFC3339");
}

#[test]
fn corrupt_document_is_replaced_instead_of_failing() {
    let (_dir, path) = store_path();
    std::fs::write(&path, "{ not json").expect("corrupt seed should be written");

    let mut store = ProgressStore::open(&path);
    assert_eq!(store.last_processed("chat-1"), None);

    store
        .record("chat-1", "m1")
        .expect("record should replace the corrupt document");

    let reopened = ProgressStore::open(&path);
    assert_eq!(reopened.last_processed("chat-1"), Some("m1"));
}

#[test]
fn unsupported_version_reads_as_empty_history() {
    let (_dir, path) = store_path();
    std::fs::write(
        &path,
        json!({
            "version": 2,
            "conversations": {
                "chat-1": { "last_message_id": "m9", "saved_at": "2026-02-14T00:00:00Z" },
            },
        })
        .to_string(),
    )
    .expect("versioned seed should be written");

    let store = ProgressStore::open(&path);
    assert_eq!(store.last_processed("chat-1"), None);
}

#[test]
fn unknown_document_fields_read_as_empty_history() {
    let (_dir, path) = store_path();
    std::fs::write(
        &path,
        json!({
            "version": 1,
            "conversations": {},
            "unexpected": true,
        })
        .to_string(),
    )
    .expect("seed with extra field should be written");

    let store = ProgressStore::open(&path);
    assert_eq!(store.last_processed("chat-1"), None);
}

#[test]
fn record_preserves_other_conversations() {
    let (_dir, path) = store_path();
    std::fs::write(
        &path,
        seeded_document(json!({
            "chat-1": { "last_message_id": "m1", "saved_at": "2026-02-14T00:00:00Z" },
            "chat-2": { "last_message_id": "m7", "saved_at": "2026-02-14T00:00:00Z" },
        })),
    )
    .expect("seed document should be written");

    let mut store = ProgressStore::open(&path);
    store
        .record("chat-1", "m2")
        .expect("record should persist the update");

    let reopened = ProgressStore::open(&path);
    assert_eq!(reopened.last_processed("chat-1"), Some("m2"));
    assert_eq!(reopened.last_processed("chat-2"), Some("m7"));
}

#[test]
fn record_leaves_no_temp_file_behind() {
    let (_dir, path) = store_path();
    let mut store = ProgressStore::open(&path);
    store.record("chat-1", "m1").expect("record should persist");

    let temp_path = path.with_file_name("progress.json.tmp");
    assert!(!temp_path.exists(), "temp file should be renamed away");
    assert!(path.exists(), "final document should exist");
}

#[test]
fn record_creates_missing_parent_directories() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let path = dir.path().join("nested").join("state").join("progress.json");

    let mut store = ProgressStore::open(&path);
    store
        .record("chat-1", "m1")
        .expect("record should create parent directories");

    assert!(path.exists());
}

#[test]
fn progress_file_resolves_under_the_repo_root() {
    let root = PathBuf::from("/repo");
    assert_eq!(
        progress_file(&root),
        PathBuf::from("/repo/.chat_scribe/progress.json")
    );
}
