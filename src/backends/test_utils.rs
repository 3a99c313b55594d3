//! Mock backends for queue controller tests

use super::{ProcessMode, ProcessOptions, RemovalBackend};
use crate::error::{BgBatchError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Scripted backend: pops one outcome per call, echoes the input when the
/// script is empty. Records inputs and tracks call concurrency.
pub struct MockBackend {
    mode: ProcessMode,
    script: Mutex<VecDeque<Result<Bytes>>>,
    calls: Mutex<Vec<Vec<u8>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl MockBackend {
    pub fn new(mode: ProcessMode) -> Self {
        Self {
            mode,
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            gate: Mutex::new(None),
        }
    }

    /// Queue an outcome for the next unscripted call
    pub fn push_outcome(&self, outcome: Result<Bytes>) {
        self.script.lock().unwrap().push_back(outcome);
    }

    /// Make every call wait on the returned notify before resolving
    pub fn gate(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&notify));
        notify
    }

    /// Inputs seen so far, in call order
    pub fn calls(&self) -> Vec<Vec<u8>> {
        self.calls.lock().unwrap().clone()
    }

    /// Highest number of simultaneously in-flight calls observed
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemovalBackend for MockBackend {
    async fn process(&self, image: &[u8], _options: &ProcessOptions) -> Result<Bytes> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(image.to_vec());

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        } else {
            // Yield so interleavings have a chance to show up.
            tokio::task::yield_now().await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.script.lock().unwrap().pop_front() {
            Some(outcome) => outcome,
            None => Ok(Bytes::copy_from_slice(image)),
        }
    }

    fn mode(&self) -> ProcessMode {
        self.mode
    }
}

/// Backend that always reports a timed-out model initialization
pub struct TimeoutBackend;

#[async_trait]
impl RemovalBackend for TimeoutBackend {
    async fn process(&self, _image: &[u8], _options: &ProcessOptions) -> Result<Bytes> {
        Err(BgBatchError::InitializationTimeout(
            std::time::Duration::from_secs(30),
        ))
    }

    fn mode(&self) -> ProcessMode {
        ProcessMode::Local
    }
}
