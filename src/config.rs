//! Configuration types for the relay and the queue controller

use crate::error::{BgBatchError, Result};
use std::time::Duration;

/// Environment variable holding the server-side provider credential
pub const API_KEY_ENV: &str = "REMOVEBG_API_KEY";

/// Default remote provider endpoint the relay forwards to
pub const DEFAULT_UPSTREAM_URL: &str = "https://api.remove.bg/v1.0/removebg";

/// Default relay endpoint the remote backend posts to
pub const DEFAULT_RELAY_ENDPOINT: &str = "http://127.0.0.1:8080/api/remove-bg";

/// Configuration for the [`crate::controller::BatchController`]
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Relay endpoint for the remote backend
    pub endpoint: String,
    /// Hard ceiling on local model initialization time
    pub init_timeout: Duration,
    /// Size ceiling for local-mode inputs, in bytes
    pub max_local_input_bytes: usize,
    /// Longest edge of the preview thumbnail, in pixels
    pub preview_max_edge: u32,
    /// Per-request timeout for the remote backend
    pub request_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_RELAY_ENDPOINT.to_string(),
            init_timeout: crate::backends::local::DEFAULT_INIT_TIMEOUT,
            max_local_input_bytes: crate::backends::local::DEFAULT_MAX_INPUT_BYTES,
            preview_max_edge: 256,
            request_timeout: crate::backends::remote::DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ControllerConfig {
    /// Create a new controller configuration builder
    #[must_use]
    pub fn builder() -> ControllerConfigBuilder {
        ControllerConfigBuilder::new()
    }
}

/// Builder for [`ControllerConfig`]
#[derive(Default)]
pub struct ControllerConfigBuilder {
    config: ControllerConfig,
}

impl ControllerConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn init_timeout(mut self, timeout: Duration) -> Self {
        self.config.init_timeout = timeout;
        self
    }

    #[must_use]
    pub fn max_local_input_bytes(mut self, limit: usize) -> Self {
        self.config.max_local_input_bytes = limit;
        self
    }

    #[must_use]
    pub fn preview_max_edge(mut self, edge: u32) -> Self {
        self.config.preview_max_edge = edge;
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Build the controller configuration
    ///
    /// # Errors
    /// Returns `InvalidConfig` for an empty endpoint, a zero init timeout,
    /// or a zero preview edge.
    pub fn build(self) -> Result<ControllerConfig> {
        if self.config.endpoint.is_empty() {
            return Err(BgBatchError::invalid_config("relay endpoint must not be empty"));
        }
        if self.config.init_timeout.is_zero() {
            return Err(BgBatchError::invalid_config("init timeout must be non-zero"));
        }
        if self.config.preview_max_edge == 0 {
            return Err(BgBatchError::invalid_config("preview edge must be non-zero"));
        }
        Ok(self.config)
    }
}

/// Configuration for the relay server
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Remote provider endpoint
    pub upstream_url: String,
    /// Server-held default credential; requests may override it
    pub api_key: Option<String>,
    /// Timeout for the upstream call
    pub request_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl RelayConfig {
    /// Create a new relay configuration builder
    #[must_use]
    pub fn builder() -> RelayConfigBuilder {
        RelayConfigBuilder::new()
    }
}

/// Builder for [`RelayConfig`]
#[derive(Default)]
pub struct RelayConfigBuilder {
    config: RelayConfig,
}

impl RelayConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    #[must_use]
    pub fn upstream_url(mut self, url: impl Into<String>) -> Self {
        self.config.upstream_url = url.into();
        self
    }

    #[must_use]
    pub fn api_key(mut self, key: Option<String>) -> Self {
        self.config.api_key = key;
        self
    }

    /// Take the default credential from `REMOVEBG_API_KEY` when no explicit
    /// key was set
    #[must_use]
    pub fn api_key_from_env(mut self) -> Self {
        if self.config.api_key.is_none() {
            self.config.api_key = std::env::var(API_KEY_ENV).ok().filter(|v| !v.is_empty());
        }
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Build the relay configuration
    ///
    /// # Errors
    /// Returns `InvalidConfig` for an empty upstream URL or bind host.
    pub fn build(self) -> Result<RelayConfig> {
        if self.config.upstream_url.is_empty() {
            return Err(BgBatchError::invalid_config("upstream URL must not be empty"));
        }
        if self.config.host.is_empty() {
            return Err(BgBatchError::invalid_config("bind host must not be empty"));
        }
        Ok(self.config)
    }
}
