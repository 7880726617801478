//! Hand-off from a finished capture to the store and the coordinator.
//!
//! The recording is saved before any network attempt. A save failure is a
//! real error (the capture is lost); a failed or skipped upload is not, the
//! recording simply waits in the offline queue.

use std::sync::Arc;

use thiserror::Error;

use super::{Capture, CaptureError};
use crate::domain::{Metadata, NewRecording, Recording, RecordingId};
use crate::store::{RecordStore, StoreError};
use crate::sync::{RecordOutcome, SkipReason, SyncCoordinator};

/// Errors that mean the capture was not saved
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("Recording could not be saved: {0}")]
    Store(#[from] StoreError),
}

/// Why a saved recording was queued instead of delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueReason {
    Offline,

    /// A sync pass was running; it or the next one will pick the recording up
    SyncBusy,

    UploadFailed(String),

    /// Delivered, but the store could not record it; it may be sent again
    NotRecorded(String),
}

/// User-visible result of a capture that was saved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Delivered right away
    Delivered(RecordingId),

    /// Saved locally; will be delivered by a later sync pass
    QueuedOffline { id: RecordingId, reason: QueueReason },
}

impl CaptureOutcome {
    pub fn id(&self) -> &RecordingId {
        match self {
            Self::Delivered(id) | Self::QueuedOffline { id, .. } => id,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }
}

/// Saves finished captures and makes one immediate delivery attempt
pub struct CaptureBridge {
    store: Arc<dyn RecordStore>,
    coordinator: Arc<SyncCoordinator>,
}

impl CaptureBridge {
    pub fn new(store: Arc<dyn RecordStore>, coordinator: Arc<SyncCoordinator>) -> Self {
        Self { store, coordinator }
    }

    /// Stop the capture device and submit what it produced
    pub async fn finish(
        &self,
        capture: &mut dyn Capture,
        title: &str,
        metadata: Metadata,
    ) -> Result<CaptureOutcome, BridgeError> {
        let recording = self.save_capture(capture, title, metadata).await?;
        Ok(self.attempt(&recording).await)
    }

    /// Save a finished capture, then try to deliver it once
    pub async fn submit(
        &self,
        payload: Vec<u8>,
        title: &str,
        metadata: Metadata,
    ) -> Result<CaptureOutcome, BridgeError> {
        let recording = self.save(payload, title, metadata).await?;
        Ok(self.attempt(&recording).await)
    }

    /// Stop the capture device and save what it produced, without any
    /// delivery attempt
    pub async fn save_capture(
        &self,
        capture: &mut dyn Capture,
        title: &str,
        metadata: Metadata,
    ) -> Result<Recording, BridgeError> {
        let payload = capture.stop().await?;
        self.save(payload, title, metadata).await
    }

    /// Persist a capture as a pending recording
    pub async fn save(
        &self,
        payload: Vec<u8>,
        title: &str,
        metadata: Metadata,
    ) -> Result<Recording, BridgeError> {
        let recording = self
            .store
            .put(NewRecording::new(payload, title, metadata))
            .await?;
        tracing::info!(id = %recording.id, "Recording saved locally: {}", recording.title);
        Ok(recording)
    }

    /// One immediate delivery attempt for a saved recording. Whatever
    /// happens, the recording is either delivered or still pending.
    pub async fn attempt(&self, recording: &Recording) -> CaptureOutcome {
        let id = recording.id.clone();

        let reason = match self.coordinator.deliver_now(recording).await {
            Ok(RecordOutcome::Delivered { .. }) => return CaptureOutcome::Delivered(id),
            Ok(RecordOutcome::Failed { error, .. }) => QueueReason::UploadFailed(error.to_string()),
            Ok(RecordOutcome::Unrecorded { error, .. }) => QueueReason::NotRecorded(error),
            Err(SkipReason::Offline) => QueueReason::Offline,
            Err(SkipReason::Busy) => QueueReason::SyncBusy,
        };

        tracing::info!(id = %id, ?reason, "Recording queued offline");
        CaptureOutcome::QueuedOffline { id, reason }
    }
}
