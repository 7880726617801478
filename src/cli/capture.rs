//! `voicenote capture` - save an audio file and try to deliver it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use super::open_store;
use super::sync::{build_coordinator, endpoint_reachable};
use crate::capture::{Capture, CaptureBridge, CaptureOutcome, FileCapture, QueueReason};
use crate::config;
use crate::domain::metadata::{KEY_DURATION, KEY_LANGUAGE, KEY_PRIORITY, KEY_PROTAGONIST};
use crate::domain::Metadata;
use crate::sync::Connectivity;

#[derive(Args, Debug)]
pub struct CaptureArgs {
    /// Audio file produced by the recorder
    pub file: PathBuf,

    /// Title of the recording
    #[arg(short, long)]
    pub title: String,

    /// Who is speaking (defaults to "Usuario" on delivery)
    #[arg(long)]
    pub protagonist: Option<String>,

    /// Spoken language (defaults to "es" on delivery)
    #[arg(long)]
    pub language: Option<String>,

    /// Priority hint (defaults to "normal" on delivery)
    #[arg(long)]
    pub priority: Option<String>,

    /// Duration in seconds
    #[arg(long)]
    pub duration: Option<u64>,

    /// Skip the immediate upload attempt
    #[arg(long)]
    pub offline: bool,
}

impl CaptureArgs {
    fn metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        let fields = [
            (KEY_PROTAGONIST, &self.protagonist),
            (KEY_LANGUAGE, &self.language),
            (KEY_PRIORITY, &self.priority),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                metadata.insert(key, value.as_str());
            }
        }
        if let Some(duration) = self.duration {
            metadata.insert(KEY_DURATION, duration.to_string());
        }
        metadata
    }
}

pub async fn execute(args: CaptureArgs) -> Result<()> {
    if args.title.trim().is_empty() {
        anyhow::bail!("A title is required");
    }

    let cfg = config::config()?;
    let store = open_store().await?;
    let coordinator = build_coordinator(cfg, store.clone(), Connectivity::offline())?;
    let bridge = CaptureBridge::new(store, coordinator.clone());

    let mut capture = FileCapture::new(&args.file);
    capture
        .start()
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    // Saved before touching the network
    let recording = bridge
        .save_capture(&mut capture, args.title.trim(), args.metadata())
        .await
        .context("Capture was not saved")?;

    if !args.offline {
        coordinator
            .connectivity()
            .set_online(endpoint_reachable(cfg).await);
    }
    let outcome = bridge.attempt(&recording).await;

    match outcome {
        CaptureOutcome::Delivered(id) => {
            println!("✅ Delivered: {} ({})", args.title.trim(), id);
        }
        CaptureOutcome::QueuedOffline { id, reason } => {
            println!("📥 Queued offline: {} ({})", args.title.trim(), id);
            match reason {
                QueueReason::Offline => println!("   Endpoint unreachable, will sync later"),
                QueueReason::SyncBusy => println!("   A sync pass is running, it will be picked up next"),
                QueueReason::UploadFailed(e) => println!("   Upload failed: {}", e),
                QueueReason::NotRecorded(e) => {
                    println!("   Delivered but not recorded, may be sent again: {}", e)
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> CaptureArgs {
        CaptureArgs {
            file: PathBuf::from("note.webm"),
            title: "Idea".to_string(),
            protagonist: None,
            language: Some("en".to_string()),
            priority: None,
            duration: Some(42),
            offline: false,
        }
    }

    #[test]
    fn test_metadata_only_carries_given_flags() {
        let metadata = args().metadata();
        assert_eq!(metadata.get(KEY_LANGUAGE), Some("en"));
        assert_eq!(metadata.get(KEY_DURATION), Some("42"));
        assert_eq!(metadata.get(KEY_PROTAGONIST), None);
        assert_eq!(metadata.len(), 2);
    }
}
