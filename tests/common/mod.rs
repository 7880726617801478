//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::Notify;

use voicenote::adapters::Delivered;
use voicenote::domain::{DeliveryFields, Metadata, NewRecording, Recording, RecordingId};
use voicenote::store::{JournalStore, RecordStore, StoreError};
use voicenote::{TransportError, Uploader};

/// Fresh store in its own temp directory
pub async fn temp_store() -> (Arc<JournalStore>, TempDir) {
    let temp = TempDir::new().unwrap();
    let store = JournalStore::open(temp.path().join("store")).await.unwrap();
    (Arc::new(store), temp)
}

/// Put a pending recording with an ASCII payload derived from the title
pub async fn put_note(store: &dyn RecordStore, title: &str) -> Recording {
    store
        .put(NewRecording::new(
            format!("audio:{}", title).into_bytes(),
            title,
            Metadata::new(),
        ))
        .await
        .unwrap()
}

/// Overwrite a stored payload so it no longer matches its digest
pub async fn corrupt_payload(store: &JournalStore, id: &RecordingId) {
    let blob = store.root().join("blobs").join(format!("{}.bin", id));
    tokio::fs::write(blob, b"bitrot").await.unwrap();
}

/// One call seen by an uploader
#[derive(Debug, Clone)]
pub struct UploadCall {
    pub title: String,
    pub source: String,
    pub metadata: Metadata,
    /// Fields as they go on the wire, defaults applied
    pub fields: DeliveryFields,
}

/// Uploader whose failures are scripted per title or per call count
#[derive(Default)]
pub struct FakeUploader {
    calls: Mutex<Vec<UploadCall>>,
    failing_titles: Mutex<HashSet<String>>,
    fail_remaining: AtomicUsize,
}

impl FakeUploader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every upload of this title fails until healed
    pub fn fail_title(&self, title: &str) {
        self.failing_titles.lock().unwrap().insert(title.to_string());
    }

    pub fn heal_title(&self, title: &str) {
        self.failing_titles.lock().unwrap().remove(title);
    }

    /// The next `n` uploads fail regardless of title
    pub fn fail_next(&self, n: usize) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<UploadCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Uploader for FakeUploader {
    fn name(&self) -> &str {
        "fake"
    }

    async fn upload(
        &self,
        _payload: &[u8],
        title: &str,
        metadata: &Metadata,
        source: &str,
    ) -> Result<Delivered, TransportError> {
        self.calls.lock().unwrap().push(UploadCall {
            title: title.to_string(),
            source: source.to_string(),
            metadata: metadata.clone(),
            fields: DeliveryFields::resolve(metadata),
        });

        let scripted_failure = self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if scripted_failure {
            return Err(TransportError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }

        if self.failing_titles.lock().unwrap().contains(title) {
            return Err(TransportError::Request("connection refused".to_string()));
        }

        Ok(Delivered { status: 200 })
    }
}

/// Uploader that parks its first call until released
#[derive(Default)]
pub struct GatedUploader {
    pub entered: Notify,
    pub release: Notify,
    calls: AtomicUsize,
}

impl GatedUploader {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Uploader for GatedUploader {
    fn name(&self) -> &str {
        "gated"
    }

    async fn upload(
        &self,
        _payload: &[u8],
        _title: &str,
        _metadata: &Metadata,
        _source: &str,
    ) -> Result<Delivered, TransportError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.entered.notify_one();
            self.release.notified().await;
        }
        Ok(Delivered { status: 200 })
    }
}

/// Store wrapper with switchable faults
pub struct FaultyStore {
    inner: Arc<JournalStore>,
    pub fail_put: AtomicBool,
    pub fail_list: AtomicBool,
    pub fail_mark_synced: AtomicBool,
}

impl FaultyStore {
    pub fn new(inner: Arc<JournalStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail_put: AtomicBool::new(false),
            fail_list: AtomicBool::new(false),
            fail_mark_synced: AtomicBool::new(false),
        })
    }

    fn fault(flag: &AtomicBool, what: &str) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Corrupt(format!("injected {} failure", what)));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FaultyStore {
    async fn put(&self, recording: NewRecording) -> Result<Recording, StoreError> {
        Self::fault(&self.fail_put, "put")?;
        self.inner.put(recording).await
    }

    async fn get(&self, id: &RecordingId) -> Result<Option<Recording>, StoreError> {
        self.inner.get(id).await
    }

    async fn list_all(&self) -> Result<Vec<Recording>, StoreError> {
        Self::fault(&self.fail_list, "list")?;
        self.inner.list_all().await
    }

    async fn list_pending(&self) -> Result<Vec<Recording>, StoreError> {
        Self::fault(&self.fail_list, "list")?;
        self.inner.list_pending().await
    }

    async fn mark_synced(&self, id: &RecordingId) -> Result<(), StoreError> {
        Self::fault(&self.fail_mark_synced, "mark_synced")?;
        self.inner.mark_synced(id).await
    }

    async fn delete(&self, id: &RecordingId) -> Result<(), StoreError> {
        self.inner.delete(id).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.inner.clear().await
    }
}
