//! Local backend: in-process segmentation model with lazy initialization

use super::{ProcessMode, ProcessOptions, RemovalBackend};
use crate::error::{BgBatchError, Result};
use crate::services::{MonotonicProgress, ProcessingStage, ProgressFn};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Hard ceiling on model initialization time
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Size ceiling for local-mode inputs
pub const DEFAULT_MAX_INPUT_BYTES: usize = 10 * 1024 * 1024;

/// The in-process segmentation model, consumed as a black box.
///
/// Implementations are expected to invoke the progress callback with
/// monotonically non-decreasing `(current, total)` pairs; the backend clamps
/// regressions regardless.
#[async_trait]
pub trait Segmenter: Send + Sync {
    /// Run background removal on a decoded-checkable image payload
    async fn remove_background(
        &self,
        image: &[u8],
        progress: Option<ProgressFn>,
    ) -> Result<Vec<u8>>;
}

/// Loads a [`Segmenter`]; called at most once per backend lifetime unless
/// the backend is reset.
#[async_trait]
pub trait SegmenterFactory: Send + Sync {
    /// Load the model. May take a long time; the backend bounds it.
    async fn load(&self) -> Result<Arc<dyn Segmenter>>;
}

/// Factory for builds without a linked model; every load fails fast.
pub struct UnavailableSegmenterFactory;

#[async_trait]
impl SegmenterFactory for UnavailableSegmenterFactory {
    async fn load(&self) -> Result<Arc<dyn Segmenter>> {
        Err(BgBatchError::misconfigured(
            "no local segmentation model is linked into this build",
        ))
    }
}

/// Backend wrapping an in-process model.
///
/// The model is initialized lazily on first use behind an async mutex, so a
/// burst of calls (or rapid mode toggling) triggers exactly one load. An
/// initialization that outlives the timeout is dropped; a later retry starts
/// a fresh load.
pub struct LocalBackend {
    factory: Arc<dyn SegmenterFactory>,
    segmenter: Mutex<Option<Arc<dyn Segmenter>>>,
    init_timeout: Duration,
    max_input_bytes: usize,
}

impl LocalBackend {
    /// Create a backend with default timeout and size ceiling
    #[must_use]
    pub fn new(factory: Arc<dyn SegmenterFactory>) -> Self {
        Self::with_limits(factory, DEFAULT_INIT_TIMEOUT, DEFAULT_MAX_INPUT_BYTES)
    }

    /// Create a backend with explicit limits
    #[must_use]
    pub fn with_limits(
        factory: Arc<dyn SegmenterFactory>,
        init_timeout: Duration,
        max_input_bytes: usize,
    ) -> Self {
        Self {
            factory,
            segmenter: Mutex::new(None),
            init_timeout,
            max_input_bytes,
        }
    }

    /// Drop the initialized model; the next call loads it again
    pub async fn reset(&self) {
        let mut guard = self.segmenter.lock().await;
        if guard.take().is_some() {
            info!("local segmenter reset");
        }
    }

    /// Whether the model is currently initialized
    pub async fn is_initialized(&self) -> bool {
        self.segmenter.lock().await.is_some()
    }

    /// Get the segmenter, loading it on first use.
    ///
    /// Holding the mutex across the load is the single-flight guard:
    /// concurrent triggers queue up and find the model already present.
    async fn segmenter(&self) -> Result<Arc<dyn Segmenter>> {
        let mut guard = self.segmenter.lock().await;
        if let Some(segmenter) = guard.as_ref() {
            return Ok(Arc::clone(segmenter));
        }

        debug!(timeout = ?self.init_timeout, "initializing local segmenter");
        let loaded = tokio::time::timeout(self.init_timeout, self.factory.load())
            .await
            .map_err(|_| {
                warn!(timeout = ?self.init_timeout, "local segmenter initialization timed out");
                BgBatchError::InitializationTimeout(self.init_timeout)
            })??;

        *guard = Some(Arc::clone(&loaded));
        info!("local segmenter initialized");
        Ok(loaded)
    }
}

#[async_trait]
impl RemovalBackend for LocalBackend {
    async fn process(&self, image: &[u8], options: &ProcessOptions) -> Result<Bytes> {
        if image.len() > self.max_input_bytes {
            return Err(BgBatchError::TooLarge {
                size: image.len(),
                limit: self.max_input_bytes,
            });
        }
        image::guess_format(image)
            .map_err(|_| BgBatchError::invalid_input("bytes are not a recognized image format"))?;

        let progress = options
            .progress
            .clone()
            .map(|cb| Arc::new(MonotonicProgress::new(cb)));

        if let Some(p) = &progress {
            p.report(ProcessingStage::Initializing, 0, 1);
        }
        let segmenter = self.segmenter().await?;
        if let Some(p) = &progress {
            p.report(ProcessingStage::Initializing, 1, 1);
        }

        let forward: Option<ProgressFn> = progress.as_ref().map(|p| {
            let p = Arc::clone(p);
            Arc::new(move |stage: ProcessingStage, current: u64, total: u64| {
                p.report(stage, current, total);
            }) as ProgressFn
        });

        let result = segmenter.remove_background(image, forward).await?;

        if result.is_empty() {
            return Err(BgBatchError::invalid_result(
                "segmenter returned an empty blob",
            ));
        }
        image::guess_format(&result).map_err(|_| {
            BgBatchError::invalid_result("segmenter returned a non-image blob")
        })?;

        if let Some(p) = &progress {
            p.report(ProcessingStage::Completed, 1, 1);
        }
        Ok(Bytes::from(result))
    }

    fn mode(&self) -> ProcessMode {
        ProcessMode::Local
    }
}
