//! Record Store Integration Tests
//!
//! Behavior of the journal-backed store through the `RecordStore` contract.

mod common;

use common::{put_note, temp_store};
use tokio_test::assert_ok;
use voicenote::domain::{Metadata, NewRecording, RecordingId, SyncState};
use voicenote::store::{purge_synced, JournalStore, RecordStore, StoreError};

#[tokio::test]
async fn test_put_then_get_returns_identical_recording() {
    let (store, _temp) = temp_store().await;

    let metadata = Metadata::new()
        .with("protagonist", "Ana")
        .with("duration", "12");
    let payload: Vec<u8> = (0..=255u8).collect();
    let saved = assert_ok!(
        store
            .put(NewRecording::new(payload.clone(), "Kickoff", metadata.clone()))
            .await
    );

    assert_eq!(saved.sync_state, SyncState::Pending);

    let loaded = store.get(&saved.id).await.unwrap().unwrap();
    assert_eq!(loaded.payload, payload);
    assert_eq!(loaded.title, "Kickoff");
    assert_eq!(loaded.metadata, metadata);
    assert_eq!(loaded.created_at, saved.created_at);
    assert_eq!(loaded.sync_state, SyncState::Pending);
}

#[tokio::test]
async fn test_duplicate_id_is_rejected() {
    let (store, _temp) = temp_store().await;
    let id = RecordingId::new();

    store
        .put(NewRecording::new(vec![1], "first", Metadata::new()).with_id(id.clone()))
        .await
        .unwrap();

    let second = store
        .put(NewRecording::new(vec![2], "second", Metadata::new()).with_id(id.clone()))
        .await;
    assert!(matches!(second, Err(StoreError::AlreadyExists(dup)) if dup == id));

    // The original is untouched
    let kept = store.get(&id).await.unwrap().unwrap();
    assert_eq!(kept.title, "first");
    assert_eq!(store.list_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_pending_is_creation_ordered() {
    let (store, _temp) = temp_store().await;

    let titles = ["one", "two", "three", "four"];
    for title in titles {
        put_note(store.as_ref(), title).await;
    }

    let pending: Vec<String> = store
        .list_pending()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.title)
        .collect();
    assert_eq!(pending, titles);
}

#[tokio::test]
async fn test_mark_synced_removes_from_pending_only() {
    let (store, _temp) = temp_store().await;
    let a = put_note(store.as_ref(), "a").await;
    let b = put_note(store.as_ref(), "b").await;

    store.mark_synced(&a.id).await.unwrap();

    let pending = store.list_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, b.id);

    let all = store.list_all().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(store.get(&a.id).await.unwrap().unwrap().sync_state, SyncState::Synced);
}

#[tokio::test]
async fn test_mark_synced_and_delete_are_idempotent() {
    let (store, _temp) = temp_store().await;
    let note = put_note(store.as_ref(), "twice").await;

    assert_ok!(store.mark_synced(&note.id).await);
    assert_ok!(store.mark_synced(&note.id).await);
    assert_ok!(store.delete(&note.id).await);
    assert_ok!(store.delete(&note.id).await);

    // Absent IDs are no-ops too
    let stranger = RecordingId::new();
    assert_ok!(store.mark_synced(&stranger).await);
    assert_ok!(store.delete(&stranger).await);

    assert!(store.get(&note.id).await.unwrap().is_none());
    assert!(store.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_mark_synced_after_delete_does_not_resurrect() {
    let (store, _temp) = temp_store().await;
    let note = put_note(store.as_ref(), "gone").await;

    store.delete(&note.id).await.unwrap();
    store.mark_synced(&note.id).await.unwrap();

    assert!(store.get(&note.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let (store, temp) = temp_store().await;
    let kept = put_note(store.as_ref(), "kept").await;
    let synced = put_note(store.as_ref(), "synced").await;
    let deleted = put_note(store.as_ref(), "deleted").await;

    store.mark_synced(&synced.id).await.unwrap();
    store.delete(&deleted.id).await.unwrap();
    drop(store);

    let reopened = JournalStore::open(temp.path().join("store")).await.unwrap();
    let pending = reopened.list_pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, kept.id);
    assert_eq!(pending[0].payload, b"audio:kept");

    let all = reopened.list_all().await.unwrap();
    assert_eq!(all.len(), 2);
    assert!(reopened.get(&deleted.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_clear_removes_everything() {
    let (store, temp) = temp_store().await;
    put_note(store.as_ref(), "a").await;
    let b = put_note(store.as_ref(), "b").await;
    store.mark_synced(&b.id).await.unwrap();

    store.clear().await.unwrap();
    assert!(store.list_all().await.unwrap().is_empty());

    let blobs = std::fs::read_dir(temp.path().join("store").join("blobs"))
        .unwrap()
        .count();
    assert_eq!(blobs, 0);

    // The store stays usable
    put_note(store.as_ref(), "after").await;
    assert_eq!(store.list_pending().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_purge_synced_leaves_pending() {
    let (store, _temp) = temp_store().await;
    let pending = put_note(store.as_ref(), "pending").await;
    for title in ["s1", "s2"] {
        let note = put_note(store.as_ref(), title).await;
        store.mark_synced(&note.id).await.unwrap();
    }

    let removed = purge_synced(store.as_ref()).await.unwrap();
    assert_eq!(removed, 2);

    let all = store.list_all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id, pending.id);
}

#[tokio::test]
async fn test_compact_preserves_visible_state() {
    let (store, temp) = temp_store().await;
    let a = put_note(store.as_ref(), "a").await;
    let b = put_note(store.as_ref(), "b").await;
    let c = put_note(store.as_ref(), "c").await;
    store.mark_synced(&b.id).await.unwrap();
    store.delete(&c.id).await.unwrap();

    let before = store.list_all().await.unwrap();
    let report = store.compact().await.unwrap();
    assert_eq!(report.live, 2);

    let after = store.list_all().await.unwrap();
    assert_eq!(before, after);

    drop(store);
    let reopened = JournalStore::open(temp.path().join("store")).await.unwrap();
    assert_eq!(reopened.list_all().await.unwrap(), before);
    assert_eq!(reopened.list_pending().await.unwrap()[0].id, a.id);

    // Compaction does not free the deleted ID
    let reuse = reopened
        .put(NewRecording::new(vec![9], "again", Metadata::new()).with_id(c.id.clone()))
        .await;
    assert!(matches!(reuse, Err(StoreError::AlreadyExists(_))));
}
