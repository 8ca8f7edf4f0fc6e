//! Tests for the filesystem message store

use super::*;
use crate::messages::DeleteFilter;
use crate::{Priority, RawJson};
use tempfile::TempDir;

const RAW_BODY: &str = r#"{ "event":   "deploy", "ok": true }"#;

fn payload(feed_id: &str, received_at: &str) -> CanonicalPayload {
    CanonicalPayload::captured(
        feed_id,
        RawJson::parse(RAW_BODY).unwrap(),
        RawJson::parse(r#"{"content-type":"application/json"}"#).unwrap(),
        RawJson::empty_object(),
        Timestamp::from_rfc3339(received_at).unwrap(),
    )
}

async fn open_store() -> (TempDir, FilesystemMessageStore) {
    let temp_dir = TempDir::new().unwrap();
    let store = FilesystemMessageStore::new(temp_dir.path().to_path_buf())
        .await
        .expect("Failed to create store");
    (temp_dir, store)
}

// ============================================================================
// Construction Tests
// ============================================================================

/// Verify that opening a store creates the message directory.
#[tokio::test]
async fn test_new_creates_directory_layout() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().join("nested").join("data");

    let store = FilesystemMessageStore::new(base.clone()).await.unwrap();

    assert!(base.join("messages").is_dir());
    assert_eq!(store.base_path(), base.as_path());
}

// ============================================================================
// Persistence Tests
// ============================================================================

/// Verify that a created message is written to its own file and leaves no temp file.
#[tokio::test]
async fn test_create_writes_single_file() {
    let (temp_dir, store) = open_store().await;
    let message = store
        .create(payload("builds", "2025-10-01T00:00:00Z"))
        .await
        .unwrap();

    let path = temp_dir
        .path()
        .join("messages")
        .join(format!("{}.json", message.id));
    assert!(path.is_file());
    assert!(!path.with_extension("tmp").exists());
}

/// Verify that the raw request text survives a trip through disk byte-for-byte.
#[tokio::test]
async fn test_raw_request_preserved_verbatim() {
    let (_temp_dir, store) = open_store().await;
    let created = store
        .create(payload("builds", "2025-10-01T00:00:00Z"))
        .await
        .unwrap();

    let fetched = store.get(created.id).await.unwrap();
    assert_eq!(fetched.raw_request.as_str(), RAW_BODY);
    assert_eq!(fetched, created);
}

/// Verify that messages are visible to a second store opened on the same directory.
#[tokio::test]
async fn test_messages_survive_reopen() {
    let (temp_dir, store) = open_store().await;
    let created = store
        .create(payload("builds", "2025-10-01T00:00:00Z"))
        .await
        .unwrap();
    drop(store);

    let reopened = FilesystemMessageStore::new(temp_dir.path().to_path_buf())
        .await
        .unwrap();
    assert_eq!(reopened.get(created.id).await.unwrap().id, created.id);
}

/// Verify that stray files in the message directory are ignored by queries.
#[tokio::test]
async fn test_query_ignores_foreign_files() {
    let (temp_dir, store) = open_store().await;
    store
        .create(payload("builds", "2025-10-01T00:00:00Z"))
        .await
        .unwrap();

    let messages_dir = temp_dir.path().join("messages");
    std::fs::write(messages_dir.join("notes.txt"), "hello").unwrap();
    std::fs::write(messages_dir.join("not-an-id.json"), "{}").unwrap();
    std::fs::write(
        messages_dir.join(format!("{}.json", MessageId::new())),
        "corrupt",
    )
    .unwrap();

    let page = store
        .query(&MessageFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
}

// ============================================================================
// State and Delete Tests
// ============================================================================

/// Verify that state changes are persisted.
#[tokio::test]
async fn test_update_state_persists() {
    let (_temp_dir, store) = open_store().await;
    let created = store
        .create(payload("builds", "2025-10-01T00:00:00Z"))
        .await
        .unwrap();

    store
        .update_state(created.id, MessageState::Acknowledged)
        .await
        .unwrap();

    let fetched = store.get(created.id).await.unwrap();
    assert_eq!(fetched.state, MessageState::Acknowledged);
    assert!(fetched.processed_at.is_some());
}

/// Verify that updating an unknown message reports not found.
#[tokio::test]
async fn test_update_state_unknown_id() {
    let (_temp_dir, store) = open_store().await;
    let result = store
        .update_state(MessageId::new(), MessageState::Resolved)
        .await;
    assert!(matches!(result, Err(StoreError::NotFound { .. })));
}

/// Verify that bulk state updates count only existing messages.
#[tokio::test]
async fn test_bulk_update_state() {
    let (_temp_dir, store) = open_store().await;
    let first = store
        .create(payload("builds", "2025-10-01T00:00:00Z"))
        .await
        .unwrap();

    let updated = store
        .bulk_update_state(&[first.id, MessageId::new()], MessageState::Resolved)
        .await
        .unwrap();
    assert_eq!(updated, 1);
}

/// Verify that single deletes remove the file.
#[tokio::test]
async fn test_delete() {
    let (_temp_dir, store) = open_store().await;
    let created = store
        .create(payload("builds", "2025-10-01T00:00:00Z"))
        .await
        .unwrap();

    store.delete(created.id).await.unwrap();
    assert!(matches!(
        store.get(created.id).await,
        Err(StoreError::NotFound { .. })
    ));
}

/// Verify bulk deletion by priority and the rejection of empty filters.
#[tokio::test]
async fn test_bulk_delete_by_filter() {
    let (_temp_dir, store) = open_store().await;
    let mut urgent = payload("alerts", "2025-10-01T00:00:00Z");
    urgent.priority = Priority::MAX;
    store.create(urgent).await.unwrap();
    store
        .create(payload("alerts", "2025-10-02T00:00:00Z"))
        .await
        .unwrap();

    let empty = DeleteSelector::Filter(DeleteFilter::default());
    assert!(matches!(
        store.bulk_delete(&empty).await,
        Err(StoreError::Validation { .. })
    ));

    let by_priority = DeleteSelector::Filter(DeleteFilter {
        priority: Some(Priority::MAX),
        ..Default::default()
    });
    assert_eq!(store.bulk_delete(&by_priority).await.unwrap(), 1);

    let remaining = store
        .query(&MessageFilter::for_feed("alerts"), Pagination::default())
        .await
        .unwrap();
    assert_eq!(remaining.total, 1);
    assert_eq!(remaining.items[0].priority, Priority::DEFAULT);
}

/// Verify that a failed write leaves no temp file behind.
#[tokio::test]
async fn test_failed_write_removes_temp_file() {
    let (_temp_dir, store) = open_store().await;
    let created = store
        .create(payload("builds", "2025-10-01T00:00:00Z"))
        .await
        .unwrap();

    // A non-empty directory at the target path makes the rename fail
    let path = store.message_path(created.id);
    std::fs::remove_file(&path).unwrap();
    std::fs::create_dir(&path).unwrap();
    std::fs::write(path.join("occupied"), b"x").unwrap();

    let result = store.write_message(&created).await;

    assert!(matches!(result, Err(StoreError::Unavailable { .. })));
    assert!(!path.with_extension("tmp").exists());
}
