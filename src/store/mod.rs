//! Durable storage for captured recordings.
//!
//! The store is the only shared mutable resource in the system. Every write
//! (`put`, `mark_synced`, `delete`) is a single atomic journal append, so
//! callers never need multi-step transactions.

pub mod journal;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{NewRecording, Recording, RecordingId};

pub use journal::{CompactReport, JournalStore};

/// Errors surfaced by the store. None of these may be swallowed: a failed
/// `put` means a capture was not saved.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Recording already exists: {0}")]
    AlreadyExists(RecordingId),

    #[error("Recording not found: {0}")]
    NotFound(RecordingId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store corrupt: {0}")]
    Corrupt(String),

    #[error("Store is locked by another process: {0}")]
    Locked(PathBuf),
}

/// Contract of the durable record store
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a new pending recording. Fails if the ID was already used.
    async fn put(&self, recording: NewRecording) -> Result<Recording, StoreError>;

    /// Fetch a recording by ID
    async fn get(&self, id: &RecordingId) -> Result<Option<Recording>, StoreError>;

    /// All recordings, oldest first. A recording whose payload cannot be
    /// read is left out rather than failing the whole listing.
    async fn list_all(&self) -> Result<Vec<Recording>, StoreError>;

    /// Recordings still awaiting delivery, oldest first. Unreadable ones are
    /// left out as in `list_all`.
    async fn list_pending(&self) -> Result<Vec<Recording>, StoreError>;

    /// Flip a recording to synced. No-op if already synced or absent.
    async fn mark_synced(&self, id: &RecordingId) -> Result<(), StoreError>;

    /// Remove a recording. No-op if absent.
    async fn delete(&self, id: &RecordingId) -> Result<(), StoreError>;

    /// Remove every recording
    async fn clear(&self) -> Result<(), StoreError>;
}

/// Store summary for status output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStatus {
    pub pending: usize,
    pub synced: usize,
    pub payload_bytes: u64,
}

impl StoreStatus {
    pub fn total(&self) -> usize {
        self.pending + self.synced
    }
}

/// Delete every synced recording, returning how many were removed.
///
/// Only relevant under the `retain` policy; pending recordings are untouched.
pub async fn purge_synced(store: &dyn RecordStore) -> Result<usize, StoreError> {
    let mut removed = 0;
    for recording in store.list_all().await? {
        if !recording.is_pending() {
            store.delete(&recording.id).await?;
            removed += 1;
        }
    }
    Ok(removed)
}
