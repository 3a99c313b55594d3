#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # bgbatch
//!
//! Batch background removal with two interchangeable backends and an HTTP
//! relay. The crate does not implement background removal itself; the
//! remote provider and the local segmentation model are consumed as black
//! boxes. What it owns is everything around them:
//!
//! - **Batch queue & lifecycle controller**: submitted images move through
//!   `pending → processing → completed/error`, strictly one at a time in
//!   submission order, with per-image error recovery.
//! - **Backend adapter**: [`RemovalBackend`] with a remote HTTP
//!   implementation and a local in-process model wrapper (lazy single-flight
//!   initialization, hard init timeout, size ceiling).
//! - **Proxy relay**: a stateless `axum` server forwarding multipart
//!   uploads to the cloud provider and streaming the binary result back
//!   (enable the `relay` feature).
//! - **Settings store**: backend mode and API key persisted as JSON across
//!   sessions.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bgbatch::{
//!     BatchController, ControllerConfig, LocalBackend, ProcessMode, RemoteBackend,
//!     SourceImage, UnavailableSegmenterFactory,
//! };
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ControllerConfig::builder()
//!     .endpoint("http://127.0.0.1:8080/api/remove-bg")
//!     .build()?;
//!
//! let remote = Arc::new(RemoteBackend::new(config.endpoint.clone())?);
//! let local = Arc::new(LocalBackend::new(Arc::new(UnavailableSegmenterFactory)));
//! let controller = BatchController::new(config, ProcessMode::Api, remote, local);
//!
//! controller.submit(vec![SourceImage {
//!     file_name: "photo.jpg".to_string(),
//!     bytes: Bytes::from(std::fs::read("photo.jpg")?),
//! }])?;
//! controller.run().await;
//!
//! for task in controller.tasks() {
//!     println!("{}: {:?}", task.file_name(), task.status());
//! }
//! # Ok(())
//! # }
//! ```

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod queue;
#[cfg(feature = "relay")]
pub mod relay;
pub mod services;
pub mod settings;

// Public API exports
pub use backends::{
    LocalBackend, ProcessMode, ProcessOptions, RemoteBackend, RemovalBackend, Segmenter,
    SegmenterFactory, UnavailableSegmenterFactory,
};
pub use config::{ControllerConfig, RelayConfig, API_KEY_ENV};
pub use controller::{BatchController, SourceImage, SubmitOutcome};
pub use error::{BgBatchError, Result};
pub use queue::{BatchQueue, ImageTask, QueueStats, TaskId, TaskStatus};
pub use services::{MonotonicProgress, ProcessingStage, ProgressFn};
pub use settings::Settings;

/// Remove the background from one in-memory image through the given backend.
///
/// Thin convenience over [`RemovalBackend::process`] for callers that do not
/// need the queue.
pub async fn remove_background_from_bytes(
    image: &[u8],
    backend: &dyn RemovalBackend,
    options: &ProcessOptions,
) -> Result<bytes::Bytes> {
    backend.process(image, options).await
}
