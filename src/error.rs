//! Error types for batch background removal operations

use std::time::Duration;
use thiserror::Error;

/// Result type alias for batch background removal operations
pub type Result<T> = std::result::Result<T, BgBatchError>;

/// Error taxonomy shared by the backends, the relay, and the queue controller
#[derive(Error, Debug)]
pub enum BgBatchError {
    /// Input is not a readable image
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Input exceeds the size ceiling for local processing
    #[error("input too large: {size} bytes (limit {limit})")]
    TooLarge {
        /// Actual input size in bytes
        size: usize,
        /// Configured ceiling in bytes
        limit: usize,
    },

    /// Transport failure reaching the remote provider
    #[error("network error: {0}")]
    Network(String),

    /// Remote provider returned a non-success response
    #[error("upstream rejected request ({status}): {message}")]
    UpstreamRejected {
        /// HTTP status returned by the provider
        status: u16,
        /// Provider-supplied or synthesized message
        message: String,
    },

    /// Server-side credential or deployment configuration missing
    #[error("misconfigured: {0}")]
    Misconfigured(String),

    /// Local model failed to initialize within the allotted time
    #[error("model initialization timed out after {0:?}")]
    InitializationTimeout(Duration),

    /// Backend returned malformed output
    #[error("invalid result: {0}")]
    InvalidResult(String),

    /// Invalid configuration or parameters
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding errors
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl BgBatchError {
    /// Create a new invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::Network(msg.into())
    }

    /// Create a new misconfiguration error
    pub fn misconfigured<S: Into<String>>(msg: S) -> Self {
        Self::Misconfigured(msg.into())
    }

    /// Create a new invalid result error
    pub fn invalid_result<S: Into<String>>(msg: S) -> Self {
        Self::InvalidResult(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an upstream rejection error from a provider status and message
    pub fn upstream<S: Into<String>>(status: u16, message: S) -> Self {
        Self::UpstreamRejected {
            status,
            message: message.into(),
        }
    }

    /// Short human-readable cause, suitable for recording on a failed task.
    ///
    /// Raw error strings (transport details, upstream bodies) stay in the
    /// logs; this is what a user sees next to the image.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidInput(_) => "The file is not a readable image.".to_string(),
            Self::TooLarge { limit, .. } => {
                let limit_mb = *limit as f64 / (1024.0 * 1024.0);
                format!("The image exceeds the {limit_mb:.0} MB limit for local processing.")
            },
            Self::Network(_) => "Could not reach the background removal service.".to_string(),
            Self::UpstreamRejected { .. } => {
                "The background removal service rejected the image.".to_string()
            },
            Self::Misconfigured(_) => "The service is not configured correctly.".to_string(),
            Self::InitializationTimeout(_) => "The local model took too long to load.".to_string(),
            Self::InvalidResult(_) => "The backend returned an unusable result.".to_string(),
            Self::InvalidConfig(_) | Self::Io(_) | Self::Image(_) => {
                "Background removal failed.".to_string()
            },
        }
    }
}
