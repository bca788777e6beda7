//! Tests for the state manager

use super::*;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_advance_cursor_monotonic() {
    let manager = StateManager::in_memory();

    let advanced = manager
        .advance_cursor("users", None, "cursor", json!("2021-01-05"))
        .await
        .unwrap();
    assert!(advanced);

    // Merging an earlier value leaves the stored state unchanged.
    let advanced = manager
        .advance_cursor("users", None, "cursor", json!("2021-01-01"))
        .await
        .unwrap();
    assert!(!advanced);
    assert_eq!(
        manager.cursor("users", "cursor").await,
        Some(json!("2021-01-05"))
    );
}

#[tokio::test]
async fn test_partition_cursor_tracks_independently() {
    let manager = StateManager::in_memory();

    manager
        .advance_cursor("events", Some("p1"), "ts", json!(100))
        .await
        .unwrap();
    manager
        .advance_cursor("events", Some("p2"), "ts", json!(50))
        .await
        .unwrap();

    // Stream-level cursor holds the furthest value across partitions.
    assert_eq!(manager.cursor("events", "ts").await, Some(json!(100)));

    let snapshot = manager.snapshot().await;
    let stream = snapshot.get_stream("events").unwrap();
    assert_eq!(stream.get_partition("p1").unwrap().cursors["ts"], json!(100));
    assert_eq!(stream.get_partition("p2").unwrap().cursors["ts"], json!(50));
}

#[tokio::test]
async fn test_partition_completion() {
    let manager = StateManager::in_memory();

    assert!(!manager.is_partition_completed("users", "p1").await);
    manager.mark_partition_completed("users", "p1").await.unwrap();
    assert!(manager.is_partition_completed("users", "p1").await);
    assert!(!manager.is_partition_completed("users", "p2").await);
}

#[tokio::test]
async fn test_stream_value_for_interpolation() {
    let manager = StateManager::in_memory();
    manager
        .advance_cursor("users", None, "updated_at", json!("2024-02-02"))
        .await
        .unwrap();

    assert_eq!(
        manager.stream_value("users").await,
        json!({"updated_at": "2024-02-02"})
    );
    assert_eq!(manager.stream_value("missing").await, json!({}));
}

#[tokio::test]
async fn test_file_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let store = Arc::new(FileStateStore::new(&path));

    let manager = StateManager::with_store(store.clone());
    manager
        .advance_cursor("users", Some("p1"), "cursor", json!("2024-06-01"))
        .await
        .unwrap();
    manager.mark_partition_completed("users", "p1").await.unwrap();

    assert!(path.exists());

    // A fresh manager resumes from the persisted checkpoint.
    let resumed = StateManager::in_memory();
    resumed.load_from(store.as_ref()).await.unwrap();
    assert_eq!(
        resumed.cursor("users", "cursor").await,
        Some(json!("2024-06-01"))
    );
    assert!(resumed.is_partition_completed("users", "p1").await);
}

#[tokio::test]
async fn test_reader_missing_file_is_fresh_start() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStateStore::new(dir.path().join("absent.json"));
    assert!(store.read().await.unwrap().is_none());
}

#[tokio::test]
async fn test_load_json() {
    let manager = StateManager::in_memory();
    manager
        .load_json(r#"{"streams": {"users": {"cursors": {"cursor": "2024-01-01"}}}}"#)
        .await
        .unwrap();
    assert_eq!(
        manager.cursor("users", "cursor").await,
        Some(json!("2024-01-01"))
    );
}

#[tokio::test]
async fn test_clones_share_state() {
    let manager = StateManager::in_memory();
    let clone = manager.clone();

    clone
        .advance_cursor("users", None, "cursor", json!(5))
        .await
        .unwrap();
    assert_eq!(manager.cursor("users", "cursor").await, Some(json!(5)));
}
