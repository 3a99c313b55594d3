//! Backend implementations for the background removal capability
//!
//! Two interchangeable providers sit behind the [`RemovalBackend`] trait:
//! - Remote backend (HTTP call through the relay to the cloud provider)
//! - Local backend (in-process segmentation model)

pub mod local;
pub mod remote;

// Test utilities for backend and controller testing
#[cfg(test)]
pub mod test_utils;

pub use self::local::{LocalBackend, Segmenter, SegmenterFactory, UnavailableSegmenterFactory};
pub use self::remote::RemoteBackend;

use crate::error::Result;
use crate::services::ProgressFn;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Which provider handles background removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessMode {
    /// Remote HTTP API, reached through the relay
    Api,
    /// In-process segmentation model
    Local,
}

impl ProcessMode {
    /// Stable string key, used in persisted settings and CLI flags
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Local => "local",
        }
    }
}

impl std::fmt::Display for ProcessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProcessMode {
    type Err = crate::error::BgBatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "api" => Ok(Self::Api),
            "local" => Ok(Self::Local),
            other => Err(crate::error::BgBatchError::invalid_config(format!(
                "unknown process mode '{other}' (expected 'api' or 'local')"
            ))),
        }
    }
}

/// Per-call options for a backend invocation
#[derive(Default, Clone)]
pub struct ProcessOptions {
    /// Caller-supplied credential, forwarded to the remote provider
    pub credential: Option<String>,
    /// Optional progress callback, invoked with `(stage, current, total)`
    pub progress: Option<ProgressFn>,
}

/// Uniform interface over the two background removal providers
#[async_trait]
pub trait RemovalBackend: Send + Sync {
    /// Remove the background from `image`, returning the processed bytes.
    ///
    /// # Errors
    /// - `InvalidInput` when the bytes are not a recognized image
    /// - `TooLarge` when the input exceeds the backend's size ceiling
    /// - `Network` / `UpstreamRejected` for remote transport and provider failures
    /// - `InitializationTimeout` when the local model fails to load in time
    /// - `InvalidResult` when the provider returns malformed output
    async fn process(&self, image: &[u8], options: &ProcessOptions) -> Result<Bytes>;

    /// Which mode this backend serves
    fn mode(&self) -> ProcessMode;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_process_mode_round_trip() {
        assert_eq!(ProcessMode::from_str("api").unwrap(), ProcessMode::Api);
        assert_eq!(ProcessMode::from_str("local").unwrap(), ProcessMode::Local);
        assert_eq!(ProcessMode::Api.to_string(), "api");
        assert!(ProcessMode::from_str("cloud").is_err());
    }

    #[test]
    fn test_process_mode_serde_keys() {
        assert_eq!(serde_json::to_string(&ProcessMode::Api).unwrap(), "\"api\"");
        let mode: ProcessMode = serde_json::from_str("\"local\"").unwrap();
        assert_eq!(mode, ProcessMode::Local);
    }
}
