//! Remote backend: delegates to the relay over HTTP

use super::{ProcessMode, ProcessOptions, RemovalBackend};
use crate::error::{BgBatchError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::{debug, warn};

/// Default per-request timeout for the relay call
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Backend that forwards images to the relay endpoint and returns the
/// processed bytes it streams back.
///
/// Success and failure are distinguished the way the relay contract defines
/// them: a binary `image/*` body is the result, a JSON `{"error": ...}` body
/// is a rejection.
pub struct RemoteBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl RemoteBackend {
    /// Create a backend targeting the given relay endpoint
    ///
    /// # Errors
    /// Returns `InvalidConfig` when the HTTP client cannot be constructed.
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Self::with_timeout(endpoint, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a backend with a custom request timeout
    ///
    /// # Errors
    /// Returns `InvalidConfig` when the HTTP client cannot be constructed.
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                BgBatchError::invalid_config(format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// The relay endpoint this backend posts to
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RemovalBackend for RemoteBackend {
    async fn process(&self, image: &[u8], options: &ProcessOptions) -> Result<Bytes> {
        image::guess_format(image)
            .map_err(|_| BgBatchError::invalid_input("bytes are not a recognized image format"))?;

        let mut form = Form::new().part(
            "image",
            Part::bytes(image.to_vec())
                .file_name("upload")
                .mime_str("application/octet-stream")
                .map_err(|e| BgBatchError::invalid_config(format!("invalid mime type: {e}")))?,
        );
        if let Some(key) = &options.credential {
            form = form.text("apiKey", key.clone());
        }

        debug!(endpoint = %self.endpoint, bytes = image.len(), "forwarding image to relay");

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| BgBatchError::network(format!("request to relay failed: {e}")))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if status.is_success() && content_type.starts_with("image/") {
            let body = response
                .bytes()
                .await
                .map_err(|e| BgBatchError::network(format!("failed to read relay body: {e}")))?;
            if body.is_empty() {
                return Err(BgBatchError::invalid_result("relay returned an empty body"));
            }
            return Ok(body);
        }

        // Anything else is the JSON error envelope (or garbage we treat as one).
        let message = match response.bytes().await {
            Ok(body) => serde_json::from_slice::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
                .unwrap_or_else(|| format!("unexpected response ({content_type})")),
            Err(e) => format!("failed to read error body: {e}"),
        };

        warn!(status = status.as_u16(), %message, "relay rejected image");
        Err(BgBatchError::upstream(status.as_u16(), message))
    }

    fn mode(&self) -> ProcessMode {
        ProcessMode::Api
    }
}
