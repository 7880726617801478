//! JSONL journal store.
//!
//! Follows the append-only pattern: every state change is one JSON line in
//! `journal.jsonl`, and the current set of recordings is derived by replay.
//! Payload bytes live next to the journal in `blobs/<id>.bin` and are written
//! (and fsynced) before the `created` line that makes them visible, so a crash
//! at any point leaves either a complete recording or none.
//!
//! Layout under the store root:
//! - `journal.jsonl` - event log
//! - `blobs/` - payload files
//! - `store.lock` - advisory lock taken around every operation, so several
//!   processes (daemon and CLI) can share one store

use std::collections::{HashMap, HashSet};
use std::fs::File as StdFile;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use chrono::Utc;
use fs2::FileExt;
use sha2::{Digest, Sha256};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

use super::{RecordStore, StoreError, StoreStatus};
use crate::domain::{
    EntryData, JournalEvent, JournalEventType, NewRecording, Recording, RecordingId, SyncState,
};

const JOURNAL_FILE: &str = "journal.jsonl";
const BLOBS_DIR: &str = "blobs";
const LOCK_FILE: &str = "store.lock";
const BLOB_EXT: &str = "bin";

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);
const LOCK_RETRY: Duration = Duration::from_millis(20);

/// File-backed recording store
pub struct JournalStore {
    root: PathBuf,
    journal_path: PathBuf,
    blobs_dir: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,

    /// Serializes journal access within this process
    io_lock: Mutex<()>,
}

/// Held for the duration of one store operation
struct StoreLock<'a> {
    _guard: MutexGuard<'a, ()>,
    file: StdFile,
}

impl Drop for StoreLock<'_> {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// A live recording as reconstructed from the journal
#[derive(Debug, Clone)]
struct LiveEntry {
    id: RecordingId,
    data: EntryData,
    sync_state: SyncState,
    seq: usize,
}

/// State derived from replaying the journal
#[derive(Debug, Default)]
struct JournalState {
    live: HashMap<RecordingId, LiveEntry>,

    /// Every ID ever created, including deleted ones
    seen: HashSet<RecordingId>,

    next_seq: usize,
}

impl JournalState {
    fn apply(&mut self, event: JournalEvent) {
        match event.event_type {
            JournalEventType::Created => {
                if let (Some(id), Some(data)) = (event.recording_id, event.entry) {
                    if self.seen.insert(id.clone()) {
                        self.live.insert(
                            id.clone(),
                            LiveEntry {
                                id,
                                data,
                                sync_state: SyncState::Pending,
                                seq: self.next_seq,
                            },
                        );
                        self.next_seq += 1;
                    }
                }
            }
            JournalEventType::Synced => {
                if let Some(entry) = event.recording_id.and_then(|id| self.live.get_mut(&id)) {
                    entry.sync_state = SyncState::Synced;
                }
            }
            JournalEventType::Deleted => {
                if let Some(id) = event.recording_id {
                    self.live.remove(&id);
                    // Compacted journals carry bare tombstones for retired IDs
                    self.seen.insert(id);
                }
            }
            JournalEventType::Cleared => {
                self.live.clear();
            }
        }
    }

    /// Live entries ordered by creation time, then journal order
    fn sorted(&self) -> Vec<&LiveEntry> {
        let mut entries: Vec<&LiveEntry> = self.live.values().collect();
        entries.sort_by(|a, b| {
            a.data
                .created_at
                .cmp(&b.data.created_at)
                .then(a.seq.cmp(&b.seq))
        });
        entries
    }
}

/// Result of compacting the journal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactReport {
    /// Recordings kept
    pub live: usize,

    /// IDs kept only as tombstones
    pub retired: usize,

    /// Payload files with no live recording that were removed
    pub orphan_blobs_removed: usize,
}

impl JournalStore {
    /// Open (or create) a store rooted at `root`
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        let blobs_dir = root.join(BLOBS_DIR);
        fs::create_dir_all(&blobs_dir).await?;

        let store = Self {
            journal_path: root.join(JOURNAL_FILE),
            lock_path: root.join(LOCK_FILE),
            blobs_dir,
            root,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            io_lock: Mutex::new(()),
        };

        drop(store.lock().await?);
        tracing::debug!("Opened recording store at {}", store.root.display());

        Ok(store)
    }

    /// How long an operation waits for another process to release the store
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Open the store at the configured location (~/.voicenote/store)
    pub async fn open_default() -> AnyResult<Self> {
        let path = crate::config::store_dir()?;
        Ok(Self::open(path).await?)
    }

    /// Root directory of this store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the journal file
    pub fn journal_path(&self) -> &Path {
        &self.journal_path
    }

    /// Take the in-process mutex, then the cross-process file lock.
    ///
    /// Any torn write left by a crashed writer is repaired before the lock is
    /// handed out.
    async fn lock(&self) -> Result<StoreLock<'_>, StoreError> {
        let guard = self.io_lock.lock().await;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .await?
            .into_std()
            .await;

        let deadline = Instant::now() + self.lock_timeout;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    let lock = StoreLock {
                        _guard: guard,
                        file,
                    };
                    self.repair_tail().await?;
                    return Ok(lock);
                }
                Err(e) if e.kind() != fs2::lock_contended_error().kind() => {
                    return Err(e.into());
                }
                Err(_) if Instant::now() >= deadline => {
                    return Err(StoreError::Locked(self.root.clone()));
                }
                Err(_) => tokio::time::sleep(LOCK_RETRY).await,
            }
        }
    }

    fn blob_path(&self, id: &RecordingId) -> PathBuf {
        self.blobs_dir.join(format!("{}.{}", id, BLOB_EXT))
    }

    /// Fix up a journal whose last append was interrupted.
    ///
    /// A tail without a trailing newline is either a complete event (newline
    /// is restored) or a torn write (the partial line is dropped).
    async fn repair_tail(&self) -> Result<(), StoreError> {
        let content = match fs::read(&self.journal_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        if content.is_empty() || content.ends_with(b"\n") {
            return Ok(());
        }

        let keep = content
            .iter()
            .rposition(|b| *b == b'\n')
            .map(|pos| pos + 1)
            .unwrap_or(0);
        let tail = &content[keep..];

        if serde_json::from_slice::<JournalEvent>(tail).is_ok() {
            let mut file = OpenOptions::new()
                .append(true)
                .open(&self.journal_path)
                .await?;
            file.write_all(b"\n").await?;
            file.sync_data().await?;
            tracing::warn!("Restored missing newline at end of journal");
        } else {
            let file = OpenOptions::new()
                .write(true)
                .open(&self.journal_path)
                .await?;
            file.set_len(keep as u64).await?;
            file.sync_all().await?;
            tracing::warn!(
                dropped_bytes = tail.len(),
                "Dropped torn write at end of journal"
            );
        }

        Ok(())
    }

    /// Replay the journal into current state
    async fn replay(&self) -> Result<JournalState, StoreError> {
        let mut state = JournalState::default();

        let content = match fs::read_to_string(&self.journal_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(state),
            Err(e) => return Err(e.into()),
        };

        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let event: JournalEvent = serde_json::from_str(line).map_err(|e| {
                StoreError::Corrupt(format!("journal line {}: {}", idx + 1, e))
            })?;
            state.apply(event);
        }

        Ok(state)
    }

    /// Append one event and fsync it
    async fn append_event(&self, event: &JournalEvent) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.journal_path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        file.sync_data().await?;

        Ok(())
    }

    /// Write a payload via temp file + rename
    async fn write_blob(&self, id: &RecordingId, payload: &[u8]) -> Result<(), StoreError> {
        let tmp_path = self.blobs_dir.join(format!("{}.tmp", id));

        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(payload).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp_path, self.blob_path(id)).await?;
        Ok(())
    }

    async fn read_blob(&self, entry: &LiveEntry) -> Result<Vec<u8>, StoreError> {
        let payload = match fs::read(self.blob_path(&entry.id)).await {
            Ok(payload) => payload,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::Corrupt(format!(
                    "payload missing for recording {}",
                    entry.id
                )));
            }
            Err(e) => return Err(e.into()),
        };

        if payload.len() as u64 != entry.data.payload_len
            || payload_digest(&payload) != entry.data.payload_sha256
        {
            return Err(StoreError::Corrupt(format!(
                "payload checksum mismatch for recording {}",
                entry.id
            )));
        }

        Ok(payload)
    }

    async fn remove_blob(&self, id: &RecordingId) -> Result<(), StoreError> {
        match fs::remove_file(self.blob_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn load(&self, entry: &LiveEntry) -> Result<Recording, StoreError> {
        let payload = self.read_blob(entry).await?;
        Ok(Recording {
            id: entry.id.clone(),
            payload,
            title: entry.data.title.clone(),
            metadata: entry.data.metadata.clone(),
            created_at: entry.data.created_at,
            sync_state: entry.sync_state,
        })
    }

    async fn load_where<F>(&self, predicate: F) -> Result<Vec<Recording>, StoreError>
    where
        F: Fn(&LiveEntry) -> bool,
    {
        let _lock = self.lock().await?;
        let state = self.replay().await?;

        let mut recordings = Vec::new();
        for entry in state.sorted().into_iter().filter(|e| predicate(e)) {
            match self.load(entry).await {
                Ok(recording) => recordings.push(recording),
                // One unreadable payload must not hide the healthy recordings
                Err(StoreError::Corrupt(reason)) => {
                    tracing::warn!(id = %entry.id, "Skipping unreadable recording: {}", reason);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(recordings)
    }

    /// Whether a recording is live, without reading its payload
    pub async fn contains(&self, id: &RecordingId) -> Result<bool, StoreError> {
        let _lock = self.lock().await?;
        Ok(self.replay().await?.live.contains_key(id))
    }

    /// Counts by state plus total payload size (does not read payloads)
    pub async fn status(&self) -> Result<StoreStatus, StoreError> {
        let _lock = self.lock().await?;
        let state = self.replay().await?;

        let mut status = StoreStatus::default();
        for entry in state.live.values() {
            match entry.sync_state {
                SyncState::Pending => status.pending += 1,
                SyncState::Synced => status.synced += 1,
            }
            status.payload_bytes += entry.data.payload_len;
        }
        Ok(status)
    }

    /// Rewrite the journal with only live recordings and tombstones, then
    /// remove payload files that no live recording references.
    pub async fn compact(&self) -> Result<CompactReport, StoreError> {
        let _lock = self.lock().await?;
        let state = self.replay().await?;
        let live = state.sorted();

        let mut out = String::new();
        let mut retired: Vec<&RecordingId> = state
            .seen
            .iter()
            .filter(|id| !state.live.contains_key(*id))
            .collect();
        retired.sort();
        for id in &retired {
            out.push_str(&serde_json::to_string(&JournalEvent::deleted((*id).clone()))?);
            out.push('\n');
        }
        for entry in &live {
            let created = JournalEvent::created(entry.id.clone(), entry.data.clone());
            out.push_str(&serde_json::to_string(&created)?);
            out.push('\n');
            if entry.sync_state == SyncState::Synced {
                out.push_str(&serde_json::to_string(&JournalEvent::synced(entry.id.clone()))?);
                out.push('\n');
            }
        }

        let tmp_path = self.root.join(format!("{}.tmp", JOURNAL_FILE));
        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(out.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp_path, &self.journal_path).await?;

        let keep: HashSet<String> = live
            .iter()
            .map(|e| format!("{}.{}", e.id, BLOB_EXT))
            .collect();
        let mut orphan_blobs_removed = 0;
        let mut entries = fs::read_dir(&self.blobs_dir).await?;
        while let Some(dir_entry) = entries.next_entry().await? {
            let name = dir_entry.file_name().to_string_lossy().to_string();
            if !keep.contains(&name) {
                fs::remove_file(dir_entry.path()).await?;
                orphan_blobs_removed += 1;
            }
        }

        let report = CompactReport {
            live: live.len(),
            retired: retired.len(),
            orphan_blobs_removed,
        };
        tracing::info!(
            live = report.live,
            retired = report.retired,
            orphans = report.orphan_blobs_removed,
            "Journal compacted"
        );
        Ok(report)
    }
}

#[async_trait]
impl RecordStore for JournalStore {
    async fn put(&self, recording: NewRecording) -> Result<Recording, StoreError> {
        let _lock = self.lock().await?;
        let state = self.replay().await?;

        if state.seen.contains(&recording.id) {
            return Err(StoreError::AlreadyExists(recording.id));
        }

        self.write_blob(&recording.id, &recording.payload).await?;

        let entry = EntryData {
            title: recording.title.clone(),
            metadata: recording.metadata.clone(),
            created_at: Utc::now(),
            payload_sha256: payload_digest(&recording.payload),
            payload_len: recording.payload.len() as u64,
        };

        let event = JournalEvent::created(recording.id.clone(), entry.clone());
        if let Err(e) = self.append_event(&event).await {
            // Not journaled, so not visible; drop the payload we just wrote
            let _ = self.remove_blob(&recording.id).await;
            return Err(e);
        }

        tracing::debug!(id = %recording.id, bytes = entry.payload_len, "Recording stored");

        Ok(Recording {
            id: recording.id,
            payload: recording.payload,
            title: recording.title,
            metadata: recording.metadata,
            created_at: entry.created_at,
            sync_state: SyncState::Pending,
        })
    }

    async fn get(&self, id: &RecordingId) -> Result<Option<Recording>, StoreError> {
        let _lock = self.lock().await?;
        let state = self.replay().await?;

        match state.live.get(id) {
            Some(entry) => Ok(Some(self.load(entry).await?)),
            None => Ok(None),
        }
    }

    async fn list_all(&self) -> Result<Vec<Recording>, StoreError> {
        self.load_where(|_| true).await
    }

    async fn list_pending(&self) -> Result<Vec<Recording>, StoreError> {
        self.load_where(|e| e.sync_state == SyncState::Pending).await
    }

    async fn mark_synced(&self, id: &RecordingId) -> Result<(), StoreError> {
        let _lock = self.lock().await?;
        let state = self.replay().await?;

        match state.live.get(id) {
            Some(entry) if entry.sync_state == SyncState::Pending => {
                self.append_event(&JournalEvent::synced(id.clone())).await?;
                tracing::debug!(id = %id, "Recording marked synced");
            }
            _ => {}
        }
        Ok(())
    }

    async fn delete(&self, id: &RecordingId) -> Result<(), StoreError> {
        let _lock = self.lock().await?;
        let state = self.replay().await?;

        if state.live.contains_key(id) {
            self.append_event(&JournalEvent::deleted(id.clone())).await?;
            self.remove_blob(id).await?;
            tracing::debug!(id = %id, "Recording deleted");
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let _lock = self.lock().await?;

        self.append_event(&JournalEvent::cleared()).await?;

        let mut entries = fs::read_dir(&self.blobs_dir).await?;
        while let Some(dir_entry) = entries.next_entry().await? {
            match fs::remove_file(dir_entry.path()).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!("Recording store cleared");
        Ok(())
    }
}

/// Hex SHA-256 of payload bytes
pub fn payload_digest(payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Metadata;
    use tempfile::TempDir;

    async fn create_test_store() -> (JournalStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let store = JournalStore::open(temp.path().join("store")).await.unwrap();
        (store, temp)
    }

    fn sample(title: &str) -> NewRecording {
        NewRecording::new(title.as_bytes().to_vec(), title, Metadata::new())
    }

    #[tokio::test]
    async fn test_held_lock_times_out() {
        let (store, _temp) = create_test_store().await;
        let store = store.with_lock_timeout(Duration::from_millis(100));

        let other = std::fs::OpenOptions::new()
            .write(true)
            .open(store.root().join(LOCK_FILE))
            .unwrap();
        other.lock_exclusive().unwrap();

        let result = store.put(sample("blocked")).await;
        assert!(matches!(result, Err(StoreError::Locked(_))));

        other.unlock().unwrap();
        store.put(sample("unblocked")).await.unwrap();
    }

    #[tokio::test]
    async fn test_two_handles_share_one_store() {
        let (first, _temp) = create_test_store().await;
        let second = JournalStore::open(first.root().to_path_buf()).await.unwrap();

        let id = first.put(sample("shared")).await.unwrap().id;
        assert!(second.get(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_reopen_after_drop_sees_records() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("store");

        let id = {
            let store = JournalStore::open(&root).await.unwrap();
            store.put(sample("persist me")).await.unwrap().id
        };

        let store = JournalStore::open(&root).await.unwrap();
        let recording = store.get(&id).await.unwrap().unwrap();
        assert_eq!(recording.title, "persist me");
        assert!(recording.is_pending());
    }

    #[tokio::test]
    async fn test_torn_tail_is_dropped_on_open() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("store");

        let id = {
            let store = JournalStore::open(&root).await.unwrap();
            let id = store.put(sample("kept")).await.unwrap().id;

            let mut file = OpenOptions::new()
                .append(true)
                .open(store.journal_path())
                .await
                .unwrap();
            file.write_all(b"{\"timestamp\":\"2026-").await.unwrap();
            id
        };

        let store = JournalStore::open(&root).await.unwrap();
        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, id);

        // Appends after repair land on a clean line
        store.put(sample("after repair")).await.unwrap();
        assert_eq!(store.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_middle_line_is_reported() {
        let (store, _temp) = create_test_store().await;
        store.put(sample("one")).await.unwrap();

        let mut file = OpenOptions::new()
            .append(true)
            .open(store.journal_path())
            .await
            .unwrap();
        file.write_all(b"not json\n").await.unwrap();

        let result = store.list_all().await;
        assert!(matches!(result, Err(StoreError::Corrupt(_))));
    }

    #[tokio::test]
    async fn test_tampered_payload_is_corrupt() {
        let (store, _temp) = create_test_store().await;
        let id = store.put(sample("original")).await.unwrap().id;

        fs::write(store.blob_path(&id), b"tampered").await.unwrap();

        let result = store.get(&id).await;
        assert!(matches!(result, Err(StoreError::Corrupt(_))));
    }

    #[tokio::test]
    async fn test_deleted_id_cannot_be_reused() {
        let (store, _temp) = create_test_store().await;
        let id = store.put(sample("first")).await.unwrap().id;
        store.delete(&id).await.unwrap();

        let result = store.put(sample("second").with_id(id)).await;
        assert!(matches!(result, Err(StoreError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_compact_keeps_live_and_tombstones() {
        let (store, _temp) = create_test_store().await;
        let gone = store.put(sample("gone")).await.unwrap().id;
        let synced = store.put(sample("synced")).await.unwrap().id;
        let pending = store.put(sample("pending")).await.unwrap().id;
        store.delete(&gone).await.unwrap();
        store.mark_synced(&synced).await.unwrap();

        // Orphan payload from an interrupted put
        fs::write(store.blobs_dir.join("stray.tmp"), b"x").await.unwrap();

        let report = store.compact().await.unwrap();
        assert_eq!(report.live, 2);
        assert_eq!(report.retired, 1);
        assert_eq!(report.orphan_blobs_removed, 1);

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, synced);
        assert_eq!(all[0].sync_state, SyncState::Synced);
        assert_eq!(all[1].id, pending);

        let reuse = store.put(sample("again").with_id(gone)).await;
        assert!(matches!(reuse, Err(StoreError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_status_counts() {
        let (store, _temp) = create_test_store().await;
        let a = store.put(sample("aaaa")).await.unwrap().id;
        store.put(sample("bb")).await.unwrap();
        store.mark_synced(&a).await.unwrap();

        let status = store.status().await.unwrap();
        assert_eq!(status.pending, 1);
        assert_eq!(status.synced, 1);
        assert_eq!(status.payload_bytes, 6);
        assert_eq!(status.total(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_payload_is_skipped_in_listings() {
        let (store, _temp) = create_test_store().await;
        let bad = store.put(sample("bitrot")).await.unwrap().id;
        let good = store.put(sample("healthy")).await.unwrap().id;

        fs::write(store.blob_path(&bad), b"flipped").await.unwrap();

        let pending = store.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, good);
        assert_eq!(store.list_all().await.unwrap().len(), 1);

        // Still live, and removable without reading the payload
        assert!(store.contains(&bad).await.unwrap());
        store.delete(&bad).await.unwrap();
        assert!(!store.contains(&bad).await.unwrap());
        assert_eq!(store.status().await.unwrap().pending, 1);
    }

    #[tokio::test]
    async fn test_missing_payload_is_skipped_in_listings() {
        let (store, _temp) = create_test_store().await;
        let lost = store.put(sample("lost")).await.unwrap().id;
        store.put(sample("kept")).await.unwrap();

        fs::remove_file(store.blob_path(&lost)).await.unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "kept");
        assert!(matches!(store.get(&lost).await, Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_payload_digest_is_hex_sha256() {
        let digest = payload_digest(b"abc");
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
