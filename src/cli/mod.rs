//! Command-line interface for voicenote.
//!
//! Provides commands for capturing recordings, running sync passes or the
//! background daemon, and inspecting or maintaining the local store.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config;
use crate::domain::RecordingId;
use crate::store::{purge_synced, JournalStore, RecordStore};

pub mod capture;
pub mod sync;

/// voicenote - Offline-first voice note capture and delivery
#[derive(Parser, Debug)]
#[command(name = "voicenote")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Save an audio file as a recording and try to deliver it
    Capture(capture::CaptureArgs),

    /// Run one sync pass over pending recordings
    Sync,

    /// Run the sync coordinator until Ctrl+C
    Daemon,

    /// List recordings in the store
    List {
        /// Only show recordings awaiting delivery
        #[arg(short, long)]
        pending: bool,

        /// Maximum number of recordings to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show details of one recording
    Show {
        /// Recording ID
        id: String,
    },

    /// Show store status
    Status,

    /// Delete one recording
    Delete {
        /// Recording ID
        id: String,
    },

    /// Delete every synced recording (retain policy only)
    Purge,

    /// Rewrite the journal without history
    Compact,

    /// Delete every recording, including undelivered ones
    Clear {
        /// Confirm data loss
        #[arg(long)]
        yes: bool,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Capture(args) => capture::execute(args).await,
            Commands::Sync => sync::execute_sync().await,
            Commands::Daemon => sync::execute_daemon().await,
            Commands::List { pending, limit } => list_recordings(pending, limit).await,
            Commands::Show { id } => show_recording(&id).await,
            Commands::Status => show_status().await,
            Commands::Delete { id } => delete_recording(&id).await,
            Commands::Purge => purge().await,
            Commands::Compact => compact().await,
            Commands::Clear { yes } => clear(yes).await,
            Commands::Config => show_config().await,
        }
    }
}

/// Open the store under the configured home
pub(crate) async fn open_store() -> Result<Arc<JournalStore>> {
    let store = JournalStore::open_default()
        .await
        .context("Failed to open recording store")?;
    Ok(Arc::new(store))
}

fn parse_id(id: &str) -> Result<RecordingId> {
    RecordingId::from_str(id).with_context(|| format!("Invalid recording ID: {}", id))
}

async fn list_recordings(pending_only: bool, limit: usize) -> Result<()> {
    let store = open_store().await?;
    let recordings = if pending_only {
        store.list_pending().await?
    } else {
        store.list_all().await?
    };

    if recordings.is_empty() {
        println!("No recordings found");
        return Ok(());
    }

    println!(
        "{:<10} {:<8} {:<20} {:>10}  {}",
        "ID", "STATE", "CREATED", "SIZE", "TITLE"
    );
    println!("{}", "-".repeat(80));

    // Newest first, like a history view
    for recording in recordings.iter().rev().take(limit) {
        println!(
            "{:<10} {:<8} {:<20} {:>10}  {}",
            recording.id.short(),
            recording.sync_state.as_str(),
            recording.created_at.format("%Y-%m-%d %H:%M:%S"),
            format_size(recording.payload_len()),
            recording.title
        );
    }

    if recordings.len() > limit {
        println!("\n... and {} more", recordings.len() - limit);
    }

    Ok(())
}

async fn show_recording(id: &str) -> Result<()> {
    let id = parse_id(id)?;
    let store = open_store().await?;

    let Some(recording) = store.get(&id).await? else {
        anyhow::bail!("Recording not found: {}", id);
    };

    println!("ID:      {}", recording.id);
    println!("Title:   {}", recording.title);
    println!("State:   {}", recording.sync_state);
    println!("Created: {}", recording.created_at.to_rfc3339());
    println!("Size:    {}", format_size(recording.payload_len()));

    if !recording.metadata.is_empty() {
        println!("Metadata:");
        for (key, value) in recording.metadata.iter() {
            println!("  {}: {}", key, value);
        }
    }

    Ok(())
}

async fn show_status() -> Result<()> {
    let store = open_store().await?;
    let status = store.status().await?;

    println!("📼 Recording Store");
    println!("═══════════════════");
    println!("  Location: {}", store.root().display());
    println!("  Pending:  {}", status.pending);
    println!("  Synced:   {}", status.synced);
    println!("  Total:    {}", status.total());
    println!("  Payloads: {}", format_size(status.payload_bytes));

    Ok(())
}

async fn delete_recording(id: &str) -> Result<()> {
    let id = parse_id(id)?;
    let store = open_store().await?;

    if !store.contains(&id).await? {
        println!("Recording {} not found, nothing to delete", id);
        return Ok(());
    }

    store.delete(&id).await?;
    println!("🗑  Deleted recording {}", id);
    Ok(())
}

async fn purge() -> Result<()> {
    let store = open_store().await?;
    let removed = purge_synced(store.as_ref()).await?;
    println!("🗑  Purged {} synced recordings", removed);
    Ok(())
}

async fn compact() -> Result<()> {
    let store = open_store().await?;
    let report = store.compact().await?;
    println!(
        "✅ Journal compacted: {} live, {} retired IDs, {} orphan payloads removed",
        report.live, report.retired, report.orphan_blobs_removed
    );
    Ok(())
}

async fn clear(confirmed: bool) -> Result<()> {
    if !confirmed {
        anyhow::bail!("Refusing to clear the store without --yes (undelivered recordings would be lost)");
    }

    let store = open_store().await?;
    let pending = store.status().await?.pending;
    store.clear().await?;

    if pending > 0 {
        println!("⚠️  Cleared store, {} undelivered recordings discarded", pending);
    } else {
        println!("✅ Cleared store");
    }
    Ok(())
}

async fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("╔═══════════════════════════════════════════════════════════════╗");
    println!("  voicenote Configuration");
    println!("╚═══════════════════════════════════════════════════════════════╝");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:  {}", cfg.home.display());
    println!("  Store: {}", cfg.store_dir().display());
    println!();
    println!("Endpoint:");
    println!("  URL:          {}", cfg.endpoint.url);
    println!("  Wire format:  {:?}", cfg.endpoint.wire_format);
    println!("  Content type: {}", cfg.endpoint.content_type);
    println!("  Timeout:      {}s", cfg.endpoint.timeout_seconds);
    println!();
    println!("Sync:");
    println!("  Interval:       {}s", cfg.sync.interval_seconds);
    println!("  Probe interval: {}s", cfg.sync.probe_interval_seconds);
    println!("  Retention:      {:?}", cfg.sync.retention);
    println!("  Source (immediate):     {}", cfg.sync.source_immediate);
    println!("  Source (offline queue): {}", cfg.sync.source_offline_queue);

    Ok(())
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1_048_576 {
        format!("{:.1} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}
