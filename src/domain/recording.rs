//! Recording entity and its sync state.
//!
//! A Recording is created once per capture and is immutable apart from
//! `sync_state`, which moves from `Pending` to `Synced` at most once.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::metadata::Metadata;

/// Unique identifier of a recording
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordingId(Uuid);

impl RecordingId {
    /// Generate a fresh random ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Short form for terminal output (first 8 chars)
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for RecordingId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for RecordingId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for RecordingId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for RecordingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Delivery state of a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Captured locally, not yet confirmed by the remote sink
    Pending,

    /// Confirmed delivered (terminal)
    Synced,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Pending => "pending",
            SyncState::Synced => "synced",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A captured recording as held by the store
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    /// Unique ID, never reused
    pub id: RecordingId,

    /// Captured audio bytes
    pub payload: Vec<u8>,

    /// Display title set before capture completed
    pub title: String,

    /// Open metadata map (defaults are resolved by consumers)
    pub metadata: Metadata,

    /// When the store accepted the recording
    pub created_at: DateTime<Utc>,

    /// Current delivery state
    pub sync_state: SyncState,
}

impl Recording {
    pub fn is_pending(&self) -> bool {
        self.sync_state == SyncState::Pending
    }

    pub fn payload_len(&self) -> u64 {
        self.payload.len() as u64
    }
}

/// A finished capture ready to be handed to the store
#[derive(Debug, Clone)]
pub struct NewRecording {
    pub id: RecordingId,
    pub payload: Vec<u8>,
    pub title: String,
    pub metadata: Metadata,
}

impl NewRecording {
    /// Build a new recording with a freshly generated ID
    pub fn new(payload: Vec<u8>, title: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            id: RecordingId::new(),
            payload,
            title: title.into(),
            metadata,
        }
    }

    /// Use a caller-chosen ID instead of a generated one
    pub fn with_id(mut self, id: RecordingId) -> Self {
        self.id = id;
        self
    }
}
