//! Audio capture seam.
//!
//! The capture device itself is external; this module defines the contract
//! the bridge consumes and a file-backed implementation used by the CLI.

pub mod bridge;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

pub use bridge::{BridgeError, CaptureBridge, CaptureOutcome, QueueReason};

/// Capture device errors. Surfaced to the user; they abort only the current
/// capture attempt.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Recording device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("No capture in progress")]
    NotCapturing,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A device that produces one audio payload per start/stop cycle
#[async_trait]
pub trait Capture: Send {
    /// Begin capturing. Starting while already capturing is a no-op.
    async fn start(&mut self) -> Result<(), CaptureError>;

    /// Finish capturing and hand back the payload
    async fn stop(&mut self) -> Result<Vec<u8>, CaptureError>;

    fn is_capturing(&self) -> bool;
}

/// Treats an audio file on disk as the capture device
#[derive(Debug, Clone)]
pub struct FileCapture {
    path: PathBuf,
    capturing: bool,
}

impl FileCapture {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            capturing: false,
        }
    }
}

#[async_trait]
impl Capture for FileCapture {
    async fn start(&mut self) -> Result<(), CaptureError> {
        if self.capturing {
            return Ok(());
        }

        match tokio::fs::metadata(&self.path).await {
            Ok(meta) if meta.is_file() => {
                self.capturing = true;
                Ok(())
            }
            Ok(_) => Err(CaptureError::DeviceUnavailable(format!(
                "{} is not a file",
                self.path.display()
            ))),
            Err(e) => Err(CaptureError::DeviceUnavailable(format!(
                "{}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    async fn stop(&mut self) -> Result<Vec<u8>, CaptureError> {
        if !self.capturing {
            return Err(CaptureError::NotCapturing);
        }
        self.capturing = false;

        Ok(tokio::fs::read(&self.path).await?)
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }
}
