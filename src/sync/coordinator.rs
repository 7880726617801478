//! Sync coordinator.
//!
//! Owns the delivery policy for pending recordings. A pass snapshots the
//! pending set and attempts each candidate in creation order, one upload in
//! flight at a time. A failed upload leaves its recording pending and the
//! pass moves on; nothing a single recording does can abort the others.
//!
//! Passes are mutually exclusive per coordinator instance. A trigger that
//! fires while a pass is running is dropped: the next timer tick or
//! connectivity event covers whatever it would have done.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

use super::{Connectivity, Retention, SyncOptions};
use crate::adapters::{TransportError, Uploader};
use crate::domain::{Recording, RecordingId};
use crate::store::RecordStore;

/// What started a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Explicit request (CLI `sync`, tests)
    Manual,

    /// Periodic timer
    Timer,

    /// Transition into online
    ConnectivityRestored,
}

/// Whether a pass is in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    Idle,
    Running,
}

/// Why a pass or attempt did not run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No connectivity; the store was not touched
    Offline,

    /// Another pass held the running flag
    Busy,
}

/// Result of one delivery attempt
#[derive(Debug, Clone)]
pub enum RecordOutcome {
    /// Delivered and recorded per retention policy
    Delivered { id: RecordingId },

    /// Upload failed; recording stays pending
    Failed {
        id: RecordingId,
        error: TransportError,
    },

    /// Upload succeeded but the store update failed; recording stays pending
    /// and may be delivered again
    Unrecorded { id: RecordingId, error: String },
}

impl RecordOutcome {
    pub fn id(&self) -> &RecordingId {
        match self {
            Self::Delivered { id } | Self::Failed { id, .. } | Self::Unrecorded { id, .. } => id,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// How a pass ended
#[derive(Debug, Clone)]
pub enum PassStatus {
    Skipped(SkipReason),

    /// Reading the pending set failed; nothing was attempted
    Aborted(String),

    /// Every candidate was attempted
    Completed(Vec<RecordOutcome>),
}

/// Summary of one pass
#[derive(Debug, Clone)]
pub struct PassReport {
    pub trigger: Trigger,
    pub status: PassStatus,
}

impl PassReport {
    fn new(trigger: Trigger, status: PassStatus) -> Self {
        Self { trigger, status }
    }

    pub fn outcomes(&self) -> &[RecordOutcome] {
        match &self.status {
            PassStatus::Completed(outcomes) => outcomes,
            _ => &[],
        }
    }

    pub fn attempted(&self) -> usize {
        self.outcomes().len()
    }

    pub fn delivered(&self) -> usize {
        self.outcomes().iter().filter(|o| o.is_delivered()).count()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.delivered()
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, PassStatus::Skipped(_))
    }
}

/// Clears the running flag when a pass ends, however it ends
struct RunningGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Delivers pending recordings to the remote sink
pub struct SyncCoordinator {
    store: Arc<dyn RecordStore>,
    uploader: Arc<dyn Uploader>,
    connectivity: Connectivity,
    options: SyncOptions,
    running: AtomicBool,
}

impl SyncCoordinator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        uploader: Arc<dyn Uploader>,
        connectivity: Connectivity,
    ) -> Self {
        Self::with_options(store, uploader, connectivity, SyncOptions::default())
    }

    pub fn with_options(
        store: Arc<dyn RecordStore>,
        uploader: Arc<dyn Uploader>,
        connectivity: Connectivity,
        options: SyncOptions,
    ) -> Self {
        Self {
            store,
            uploader,
            connectivity,
            options,
            running: AtomicBool::new(false),
        }
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn state(&self) -> PassState {
        if self.running.load(Ordering::Acquire) {
            PassState::Running
        } else {
            PassState::Idle
        }
    }

    /// Claim the running flag. Check and set are one atomic step.
    fn try_begin(&self) -> Option<RunningGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunningGuard {
                flag: &self.running,
            })
    }

    /// Run one pass over the pending set. Never fails; the report says what
    /// happened.
    pub async fn run_pass(&self, trigger: Trigger) -> PassReport {
        if !self.connectivity.is_online() {
            tracing::debug!(?trigger, "Offline, skipping sync pass");
            return PassReport::new(trigger, PassStatus::Skipped(SkipReason::Offline));
        }

        let Some(_guard) = self.try_begin() else {
            tracing::debug!(?trigger, "Sync pass already running, trigger dropped");
            return PassReport::new(trigger, PassStatus::Skipped(SkipReason::Busy));
        };

        let candidates = match self.store.list_pending().await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::error!("Sync pass aborted, could not read pending recordings: {}", e);
                return PassReport::new(trigger, PassStatus::Aborted(e.to_string()));
            }
        };

        if candidates.is_empty() {
            tracing::debug!("No pending recordings to sync");
            return PassReport::new(trigger, PassStatus::Completed(Vec::new()));
        }

        tracing::info!(?trigger, "Found {} pending recordings. Syncing...", candidates.len());

        let mut outcomes = Vec::with_capacity(candidates.len());
        for recording in &candidates {
            let outcome = self
                .deliver(recording, &self.options.source_offline_queue)
                .await;
            outcomes.push(outcome);
        }

        let report = PassReport::new(trigger, PassStatus::Completed(outcomes));
        tracing::info!(
            delivered = report.delivered(),
            failed = report.failed(),
            "Sync pass finished"
        );
        report
    }

    /// Single attempt for a freshly captured recording.
    ///
    /// Shares the running flag with passes so it never overlaps one; if a
    /// pass is running the attempt is skipped and the recording waits for
    /// the next pass.
    pub async fn deliver_now(&self, recording: &Recording) -> Result<RecordOutcome, SkipReason> {
        if !self.connectivity.is_online() {
            return Err(SkipReason::Offline);
        }

        let Some(_guard) = self.try_begin() else {
            tracing::debug!(id = %recording.id, "Sync pass running, immediate upload deferred");
            return Err(SkipReason::Busy);
        };

        Ok(self
            .deliver(recording, &self.options.source_immediate)
            .await)
    }

    /// Upload one recording and record the result. Faults are caught here.
    async fn deliver(&self, recording: &Recording, source: &str) -> RecordOutcome {
        let id = recording.id.clone();

        let upload = self
            .uploader
            .upload(
                &recording.payload,
                &recording.title,
                &recording.metadata,
                source,
            )
            .await;

        if let Err(error) = upload {
            tracing::warn!("Failed to sync recording {}: {}", id, error);
            return RecordOutcome::Failed { id, error };
        }

        match self.finalize(&id).await {
            Ok(()) => {
                tracing::info!("Synced recording: {} ({})", recording.title, id);
                RecordOutcome::Delivered { id }
            }
            Err(e) => {
                tracing::error!("Recording {} delivered but store update failed: {}", id, e);
                RecordOutcome::Unrecorded {
                    id,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Mark synced, then apply the retention policy
    async fn finalize(&self, id: &RecordingId) -> Result<(), crate::store::StoreError> {
        self.store.mark_synced(id).await?;
        if self.options.retention == Retention::Delete {
            self.store.delete(id).await?;
        }
        Ok(())
    }

    /// Start the trigger loop: periodic timer plus connectivity-restored
    /// events. The first timer tick fires immediately.
    pub fn spawn(self: Arc<Self>) -> SyncHandle {
        let (stop_tx, stop_rx) = mpsc::channel::<()>(1);
        let task = tokio::spawn(run_triggers(self, stop_rx));
        SyncHandle { stop_tx, task }
    }

    /// Fire a pass in the background so the trigger loop keeps listening;
    /// overlapping triggers are then rejected by the running flag.
    fn fire(self: &Arc<Self>, trigger: Trigger, passes: &mut JoinSet<()>) {
        let coordinator = Arc::clone(self);
        passes.spawn(async move {
            coordinator.run_pass(trigger).await;
        });
    }
}

/// Handle to stop the trigger loop
pub struct SyncHandle {
    stop_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Stop listening for triggers. Returns once any in-flight pass has run
    /// to completion.
    pub async fn stop(self) -> Result<()> {
        let _ = self.stop_tx.send(()).await;
        self.task.await?;
        Ok(())
    }
}

async fn run_triggers(coordinator: Arc<SyncCoordinator>, mut stop_rx: mpsc::Receiver<()>) {
    let mut online_rx = coordinator.connectivity.subscribe();
    let mut ticker = tokio::time::interval(coordinator.options.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        interval_secs = coordinator.options.interval.as_secs(),
        "Sync coordinator started"
    );

    let mut passes = JoinSet::new();

    loop {
        tokio::select! {
            _ = stop_rx.recv() => {
                tracing::info!("Sync coordinator stopping...");
                break;
            }
            _ = ticker.tick() => {
                coordinator.fire(Trigger::Timer, &mut passes);
            }
            changed = online_rx.changed() => {
                if changed.is_err() {
                    tracing::warn!("Connectivity signal closed");
                    break;
                }
                if *online_rx.borrow_and_update() {
                    tracing::info!("Network restored. Attempting sync...");
                    coordinator.fire(Trigger::ConnectivityRestored, &mut passes);
                }
            }
            Some(joined) = passes.join_next(), if !passes.is_empty() => {
                if let Err(e) = joined {
                    tracing::error!("Sync pass task failed: {}", e);
                }
            }
        }
    }

    if !passes.is_empty() {
        tracing::info!("Waiting for the in-flight sync pass to finish...");
    }
    while let Some(joined) = passes.join_next().await {
        if let Err(e) = joined {
            tracing::error!("Sync pass task failed: {}", e);
        }
    }
}
