//! Adapters for the remote ingestion sink.
//!
//! An [`Uploader`] performs exactly one delivery attempt per call. It holds
//! no queue state and knows nothing about the store: retries are the sync
//! coordinator's business.

pub mod http;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Metadata;

pub use http::HttpUploader;

/// Any failed delivery attempt. The coordinator treats all variants alike:
/// the recording stays pending and is retried on a later pass.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Remote sink returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Upload timed out after {0:?}")]
    Timeout(Duration),
}

/// Confirmation of a successful delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivered {
    /// HTTP status returned by the sink
    pub status: u16,
}

/// How a recording is encoded on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    /// multipart/form-data with the payload in a `data` file part
    Multipart,

    /// Payload as the raw request body, fields in the query string
    Raw,
}

/// One delivery attempt of one recording
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Human-readable uploader name
    fn name(&self) -> &str;

    /// Send the payload with its title, metadata and source tag.
    ///
    /// Missing metadata keys are filled with their documented defaults.
    async fn upload(
        &self,
        payload: &[u8],
        title: &str,
        metadata: &Metadata,
        source: &str,
    ) -> Result<Delivered, TransportError>;
}
