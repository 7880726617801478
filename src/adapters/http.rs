//! HTTP uploader for the ingestion webhook.
//!
//! Sends one POST per attempt. Depending on [`WireFormat`] the payload is a
//! `data` file part in a multipart form, or the raw body with the fields
//! carried in the query string.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};

use super::{Delivered, TransportError, Uploader, WireFormat};
use crate::config::EndpointSettings;
use crate::domain::{DeliveryFields, Metadata};

/// Longest slice of an error response body kept in the error
const MAX_ERROR_BODY: usize = 200;

/// HTTP client for the remote sink
pub struct HttpUploader {
    settings: EndpointSettings,
    client: reqwest::Client,
}

impl HttpUploader {
    /// Create an uploader; the client-level timeout bounds each attempt
    pub fn new(settings: EndpointSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { settings, client })
    }

    /// Create from the global configuration
    pub fn from_config() -> Result<Self> {
        let config = crate::config::config()?;
        Self::new(config.endpoint.clone())
    }

    pub fn endpoint(&self) -> &str {
        &self.settings.url
    }

    /// File name for the payload part, e.g. `recording-1718000000000.webm`
    fn file_name(&self) -> String {
        format!(
            "recording-{}.{}",
            Utc::now().timestamp_millis(),
            file_extension(&self.settings.content_type)
        )
    }

    fn build_request(
        &self,
        payload: &[u8],
        title: &str,
        fields: DeliveryFields,
        source: &str,
        timestamp: String,
    ) -> Result<reqwest::RequestBuilder, TransportError> {
        let request = self.client.post(&self.settings.url);

        match self.settings.wire_format {
            WireFormat::Multipart => {
                let file_part = Part::bytes(payload.to_vec())
                    .file_name(self.file_name())
                    .mime_str(&self.settings.content_type)
                    .map_err(|e| TransportError::Request(e.to_string()))?;

                let form = Form::new()
                    .part("data", file_part)
                    .text("title", title.to_string())
                    .text("protagonist", fields.protagonist)
                    .text("language", fields.language)
                    .text("priority", fields.priority)
                    .text("source", source.to_string())
                    .text("timestamp", timestamp);

                Ok(request.multipart(form))
            }
            WireFormat::Raw => Ok(request
                .query(&[
                    ("title", title),
                    ("protagonist", fields.protagonist.as_str()),
                    ("language", fields.language.as_str()),
                    ("priority", fields.priority.as_str()),
                    ("source", source),
                    ("timestamp", timestamp.as_str()),
                    ("filename", self.file_name().as_str()),
                ])
                .header(CONTENT_TYPE, self.settings.content_type.as_str())
                .body(payload.to_vec())),
        }
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    fn name(&self) -> &str {
        "http"
    }

    async fn upload(
        &self,
        payload: &[u8],
        title: &str,
        metadata: &Metadata,
        source: &str,
    ) -> Result<Delivered, TransportError> {
        let fields = DeliveryFields::resolve(metadata);
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

        let response = self
            .build_request(payload, title, fields, source, timestamp)?
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(self.settings.timeout())
                } else {
                    TransportError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        Ok(Delivered {
            status: status.as_u16(),
        })
    }
}

/// Extension for a MIME type, e.g. `audio/webm;codecs=opus` -> `webm`
fn file_extension(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .and_then(|mime| mime.split('/').nth(1))
        .map(str::trim)
        .filter(|ext| !ext.is_empty())
        .unwrap_or("bin")
}
