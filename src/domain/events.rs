//! Journal events for the recording store.
//!
//! The store journal is append-only. Each line is one event; the current set
//! of recordings is derived by replaying the journal in order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::metadata::Metadata;
use super::recording::RecordingId;

/// A single journal line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEvent {
    /// When this event was written (ISO 8601)
    pub timestamp: DateTime<Utc>,

    /// Recording this event applies to (absent for store-wide events)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording_id: Option<RecordingId>,

    /// Type of event
    pub event_type: JournalEventType,

    /// Entry fields (only on `Created`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<EntryData>,
}

impl JournalEvent {
    pub fn created(id: RecordingId, entry: EntryData) -> Self {
        Self {
            timestamp: entry.created_at,
            recording_id: Some(id),
            event_type: JournalEventType::Created,
            entry: Some(entry),
        }
    }

    pub fn synced(id: RecordingId) -> Self {
        Self::for_recording(id, JournalEventType::Synced)
    }

    pub fn deleted(id: RecordingId) -> Self {
        Self::for_recording(id, JournalEventType::Deleted)
    }

    pub fn cleared() -> Self {
        Self {
            timestamp: Utc::now(),
            recording_id: None,
            event_type: JournalEventType::Cleared,
            entry: None,
        }
    }

    fn for_recording(id: RecordingId, event_type: JournalEventType) -> Self {
        Self {
            timestamp: Utc::now(),
            recording_id: Some(id),
            event_type,
            entry: None,
        }
    }
}

/// Types of journal events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalEventType {
    /// Recording accepted into the store (pending)
    Created,

    /// Delivery confirmed
    Synced,

    /// Recording removed
    Deleted,

    /// All recordings removed
    Cleared,
}

/// Persisted fields of a recording, minus the payload bytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryData {
    pub title: String,

    #[serde(default)]
    pub metadata: Metadata,

    pub created_at: DateTime<Utc>,

    /// Hex SHA-256 of the payload blob
    pub payload_sha256: String,

    pub payload_len: u64,
}
