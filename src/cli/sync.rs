//! `voicenote sync` and `voicenote daemon`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use super::open_store;
use crate::adapters::HttpUploader;
use crate::config::{self, ResolvedConfig};
use crate::store::{JournalStore, RecordStore};
use crate::sync::{
    probe_endpoint, spawn_probe, Connectivity, PassStatus, RecordOutcome, SkipReason,
    SyncCoordinator, SyncOptions, Trigger,
};

/// Upper bound on the startup reachability probe
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// One bounded reachability check of the configured endpoint
pub(crate) async fn endpoint_reachable(cfg: &ResolvedConfig) -> bool {
    let timeout = cfg.endpoint.timeout().min(PROBE_TIMEOUT);
    probe_endpoint(&cfg.endpoint.url, timeout).await
}

/// Connectivity seeded from one check of the endpoint
pub(crate) async fn initial_connectivity(cfg: &ResolvedConfig) -> Connectivity {
    Connectivity::new(endpoint_reachable(cfg).await)
}

/// Wire the store, HTTP uploader and connectivity into a coordinator
pub(crate) fn build_coordinator(
    cfg: &ResolvedConfig,
    store: Arc<JournalStore>,
    connectivity: Connectivity,
) -> Result<Arc<SyncCoordinator>> {
    let store: Arc<dyn RecordStore> = store;
    let uploader = Arc::new(HttpUploader::new(cfg.endpoint.clone())?);

    Ok(Arc::new(SyncCoordinator::with_options(
        store,
        uploader,
        connectivity,
        SyncOptions::from(&cfg.sync),
    )))
}

pub async fn execute_sync() -> Result<()> {
    let cfg = config::config()?;
    let store = open_store().await?;
    let connectivity = initial_connectivity(cfg).await;
    let coordinator = build_coordinator(cfg, store, connectivity)?;

    println!("🔄 Syncing pending recordings → {}", cfg.endpoint.url);

    let report = coordinator.run_pass(Trigger::Manual).await;
    match &report.status {
        PassStatus::Skipped(SkipReason::Offline) => {
            println!("⚠️  Endpoint unreachable, nothing sent");
        }
        PassStatus::Skipped(SkipReason::Busy) => {
            println!("⏳ A sync pass is already running");
        }
        PassStatus::Aborted(e) => {
            anyhow::bail!("Sync pass aborted: {}", e);
        }
        PassStatus::Completed(outcomes) if outcomes.is_empty() => {
            println!("✅ No pending recordings");
        }
        PassStatus::Completed(outcomes) => {
            for outcome in outcomes {
                match outcome {
                    RecordOutcome::Delivered { id } => println!("   ✅ {}", id.short()),
                    RecordOutcome::Failed { id, error } => {
                        println!("   ❌ {} {}", id.short(), error)
                    }
                    RecordOutcome::Unrecorded { id, error } => {
                        println!("   ⚠️  {} delivered, not recorded: {}", id.short(), error)
                    }
                }
            }
            println!();
            println!(
                "Delivered {}/{} ({} still pending)",
                report.delivered(),
                report.attempted(),
                report.failed()
            );
        }
    }

    Ok(())
}

pub async fn execute_daemon() -> Result<()> {
    let cfg = config::config()?;
    let store = open_store().await?;
    let connectivity = initial_connectivity(cfg).await;
    let coordinator = build_coordinator(cfg, store, connectivity.clone())?;

    println!("🎙  voicenote daemon");
    println!("   Endpoint: {}", cfg.endpoint.url);
    println!("   Interval: {}s", cfg.sync.interval_seconds);
    println!("   Online:   {}", connectivity.is_online());
    println!("   Press Ctrl+C to stop");
    println!();

    let probe = spawn_probe(
        connectivity,
        cfg.endpoint.url.clone(),
        cfg.sync.probe_interval(),
    );
    let handle = coordinator.spawn();

    tokio::signal::ctrl_c().await?;
    println!("\n🛑 Stopping...");

    probe.abort();
    handle.stop().await?;

    Ok(())
}
