//! Background delivery of pending recordings.
//!
//! - Connectivity: online/offline signal and the endpoint probe
//! - Coordinator: pass scheduling, mutual exclusion, per-record isolation

pub mod connectivity;
pub mod coordinator;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::SyncSettings;

pub use connectivity::{probe_endpoint, spawn_probe, Connectivity};
pub use coordinator::{
    PassReport, PassState, PassStatus, RecordOutcome, SkipReason, SyncCoordinator, SyncHandle,
    Trigger,
};

/// What happens to a recording once its delivery is confirmed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Retention {
    /// Mark synced, then delete from the store
    Delete,

    /// Keep it as synced for later listing
    Retain,
}

/// Coordinator settings
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub retention: Retention,

    /// Periodic trigger interval
    pub interval: Duration,

    /// Source tag for the post-capture attempt
    pub source_immediate: String,

    /// Source tag for queued replays
    pub source_offline_queue: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from(&SyncSettings::default())
    }
}

impl From<&SyncSettings> for SyncOptions {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            retention: settings.retention,
            interval: settings.interval(),
            source_immediate: settings.source_immediate.clone(),
            source_offline_queue: settings.source_offline_queue.clone(),
        }
    }
}
