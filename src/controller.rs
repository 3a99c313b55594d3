//! Batch controller: submission validation and the sequential dispatch loop
//!
//! The controller owns the queue and both backends. Tasks are dispatched
//! strictly one at a time in submission order; this bounds remote API rate
//! and local model memory pressure, and it is what makes completion order
//! equal submission order.

use crate::backends::{ProcessMode, ProcessOptions, RemovalBackend};
use crate::config::ControllerConfig;
use crate::error::{BgBatchError, Result};
use crate::queue::{BatchQueue, ImageTask, QueueStats, TaskId};
use crate::services::{make_preview, ProgressFn};
use bytes::Bytes;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

/// One file handed to [`BatchController::submit`]
#[derive(Debug, Clone)]
pub struct SourceImage {
    /// Display and download label
    pub file_name: String,
    /// Raw file bytes
    pub bytes: Bytes,
}

/// What a submission produced
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    /// Ids of the tasks created, in submission order
    pub accepted: Vec<TaskId>,
    /// Number of files rejected as non-images
    pub skipped: usize,
}

/// Owns the task queue and drives it through the selected backend.
///
/// All methods take `&self`; the queue sits behind a mutex so tasks can be
/// removed while [`run`](Self::run) is awaiting a backend call.
pub struct BatchController {
    config: ControllerConfig,
    queue: Mutex<BatchQueue>,
    remote: Arc<dyn RemovalBackend>,
    local: Arc<dyn RemovalBackend>,
    mode: RwLock<ProcessMode>,
    credential: RwLock<Option<String>>,
    progress: Mutex<Option<ProgressFn>>,
    notices: Mutex<Vec<String>>,
}

impl BatchController {
    /// Create a controller with explicit backend instances
    #[must_use]
    pub fn new(
        config: ControllerConfig,
        mode: ProcessMode,
        remote: Arc<dyn RemovalBackend>,
        local: Arc<dyn RemovalBackend>,
    ) -> Self {
        Self {
            config,
            queue: Mutex::new(BatchQueue::new()),
            remote,
            local,
            mode: RwLock::new(mode),
            credential: RwLock::new(None),
            progress: Mutex::new(None),
            notices: Mutex::new(Vec::new()),
        }
    }

    /// Currently selected backend mode
    #[must_use]
    pub fn mode(&self) -> ProcessMode {
        *self.mode.read().unwrap()
    }

    /// Switch backend mode. Takes effect for the next dispatched task; an
    /// in-flight call finishes under the mode it started with.
    pub fn set_mode(&self, mode: ProcessMode) {
        let previous = {
            let mut guard = self.mode.write().unwrap();
            std::mem::replace(&mut *guard, mode)
        };
        if previous != mode {
            info!(from = %previous, to = %mode, "process mode switched");
        }
    }

    /// Set the caller-supplied credential forwarded in remote mode
    pub fn set_credential(&self, credential: Option<String>) {
        *self.credential.write().unwrap() = credential;
    }

    /// Set the progress callback handed to backend calls
    pub fn set_progress(&self, progress: Option<ProgressFn>) {
        *self.progress.lock().unwrap() = progress;
    }

    /// Validate and enqueue a batch of files.
    ///
    /// Each file must decode as an image; a displayable preview is captured
    /// synchronously here, before any backend work. Invalid files are
    /// skipped, and the valid subset is accepted in submission order.
    ///
    /// # Errors
    /// Returns `InvalidInput` only when a non-empty batch contains no valid
    /// image at all, the single aggregate warning case.
    pub fn submit(&self, files: Vec<SourceImage>) -> Result<SubmitOutcome> {
        let total = files.len();
        let mut accepted = Vec::new();
        let mut skipped = 0usize;

        let mut queue = self.queue.lock().unwrap();
        for file in files {
            match make_preview(&file.bytes, self.config.preview_max_edge) {
                Ok(preview) => {
                    let id = queue.enqueue(file.file_name, file.bytes, preview);
                    accepted.push(id);
                },
                Err(e) => {
                    debug!(file = %file.file_name, error = %e, "submission skipped");
                    skipped += 1;
                },
            }
        }
        drop(queue);

        if accepted.is_empty() && total > 0 {
            return Err(BgBatchError::invalid_input(
                "none of the submitted files are readable images",
            ));
        }
        info!(accepted = accepted.len(), skipped, "batch submitted");
        Ok(SubmitOutcome { accepted, skipped })
    }

    /// Process every pending task, strictly sequentially in submission
    /// order. One task's failure never aborts the rest; per-task errors are
    /// recorded on the task.
    ///
    /// Files submitted while this runs join the same queue and are picked
    /// up before it returns.
    pub async fn run(&self) {
        loop {
            let next = {
                let mut queue = self.queue.lock().unwrap();
                queue.next_pending().and_then(|id| {
                    queue.dispatch(id).map(|source| (id, source))
                })
            };
            let Some((id, source)) = next else { break };

            let mode = self.mode();
            let options = ProcessOptions {
                credential: self.credential.read().unwrap().clone(),
                progress: self.progress.lock().unwrap().clone(),
            };

            let mut outcome = self.backend_for(mode).process(&source, &options).await;

            // Local model load timed out: fall back to the remote path for
            // this and all subsequent tasks, and tell the user.
            if mode == ProcessMode::Local {
                if let Err(BgBatchError::InitializationTimeout(_)) = &outcome {
                    warn!(%id, "local model initialization timed out, falling back to remote mode");
                    self.set_mode(ProcessMode::Api);
                    self.notices.lock().unwrap().push(
                        "The local model took too long to load; switched to the remote API."
                            .to_string(),
                    );
                    outcome = self.remote.process(&source, &options).await;
                }
            }

            let mut queue = self.queue.lock().unwrap();
            match outcome {
                Ok(result) => {
                    if !queue.complete(id, result) {
                        debug!(%id, "result arrived for a task no longer in the queue");
                    }
                },
                Err(e) => {
                    warn!(%id, error = %e, "task failed");
                    if !queue.fail(id, e.user_message()) {
                        debug!(%id, "failure arrived for a task no longer in the queue");
                    }
                },
            }
        }
    }

    /// Remove one task regardless of status; irreversible
    pub fn remove(&self, id: TaskId) -> bool {
        self.queue.lock().unwrap().remove(id)
    }

    /// Clear the queue, releasing all owned resources
    pub fn reset(&self) {
        self.queue.lock().unwrap().reset();
    }

    /// Clone the source of a terminal task into a brand-new pending task.
    ///
    /// This is the manual-resubmission path: the original record keeps its
    /// terminal state and the retry gets a fresh id.
    pub fn resubmit(&self, id: TaskId) -> Option<TaskId> {
        let mut queue = self.queue.lock().unwrap();
        let (file_name, source, preview) = {
            let task = queue.get(id)?;
            if !task.status().is_terminal() {
                return None;
            }
            (
                task.file_name().to_string(),
                task.source().clone(),
                task.preview().clone(),
            )
        };
        Some(queue.enqueue(file_name, source, preview))
    }

    /// Aggregate counters, derived from the task list
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        self.queue.lock().unwrap().stats()
    }

    /// Snapshot of all tasks in submission order
    #[must_use]
    pub fn tasks(&self) -> Vec<ImageTask> {
        self.queue.lock().unwrap().tasks().to_vec()
    }

    /// Snapshot of one task
    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<ImageTask> {
        self.queue.lock().unwrap().get(id).cloned()
    }

    /// Processed bytes of a completed task, for download
    #[must_use]
    pub fn result_bytes(&self, id: TaskId) -> Option<Bytes> {
        self.queue
            .lock()
            .unwrap()
            .get(id)
            .and_then(|t| t.result().cloned())
    }

    /// Drain user-visible notices (for example the fallback notice)
    #[must_use]
    pub fn take_notices(&self) -> Vec<String> {
        std::mem::take(&mut self.notices.lock().unwrap())
    }

    fn backend_for(&self, mode: ProcessMode) -> &Arc<dyn RemovalBackend> {
        match mode {
            ProcessMode::Api => &self.remote,
            ProcessMode::Local => &self.local,
        }
    }
}
