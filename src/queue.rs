//! Batch queue: task records and their lifecycle state machine
//!
//! All task mutation funnels through [`BatchQueue`]'s transition methods
//! (`dispatch`, `complete`, `fail`, `remove`, `reset`). Nothing else writes
//! task fields, which is what keeps the lifecycle invariants checkable in
//! one place.

use bytes::Bytes;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

/// Opaque, stable identity of a submitted image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TaskId(Uuid);

impl TaskId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle state of one submitted image
///
/// ```text
/// pending --(dispatch)--> processing --(complete)--> completed
///                                    \-(fail)------> error
/// ```
/// `Completed` and `Error` are terminal; a task never leaves them except by
/// being resubmitted as a new task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Queued, waiting for dispatch
    Pending,
    /// Handed to a backend, awaiting its result
    Processing,
    /// Backend succeeded; result bytes are present
    Completed,
    /// Backend failed; error detail is present
    Error,
}

impl TaskStatus {
    /// Whether this state admits no further transitions
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// One submitted image's lifecycle record
#[derive(Debug, Clone)]
pub struct ImageTask {
    id: TaskId,
    file_name: String,
    source: Bytes,
    preview: Bytes,
    result: Option<Bytes>,
    status: TaskStatus,
    error_detail: Option<String>,
}

impl ImageTask {
    /// Unique id, stable for the task's lifetime
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Display and download label
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Original, unmodified image bytes
    #[must_use]
    pub fn source(&self) -> &Bytes {
        &self.source
    }

    /// Thumbnail captured at submission time
    #[must_use]
    pub fn preview(&self) -> &Bytes {
        &self.preview
    }

    /// Processed output, present iff the task completed
    #[must_use]
    pub fn result(&self) -> Option<&Bytes> {
        self.result.as_ref()
    }

    /// Current lifecycle state
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Human-readable failure cause, present iff the task errored
    #[must_use]
    pub fn error_detail(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }
}

/// Aggregate counters, recomputed from the task list on every call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct QueueStats {
    /// Number of tasks in the queue
    pub total: usize,
    /// Tasks waiting for dispatch
    pub pending: usize,
    /// Tasks currently handed to a backend (0 or 1 by design)
    pub processing: usize,
    /// Tasks with a result
    pub completed: usize,
    /// Tasks with an error
    pub failed: usize,
}

/// Owned, ordered collection of [`ImageTask`]s and the only writer of their
/// lifecycle fields.
#[derive(Default)]
pub struct BatchQueue {
    tasks: Vec<ImageTask>,
}

impl BatchQueue {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new task in `Pending` state, preserving submission order
    pub fn enqueue(&mut self, file_name: String, source: Bytes, preview: Bytes) -> TaskId {
        let id = TaskId::generate();
        self.tasks.push(ImageTask {
            id,
            file_name,
            source,
            preview,
            result: None,
            status: TaskStatus::Pending,
            error_detail: None,
        });
        debug!(%id, "task enqueued");
        id
    }

    /// All tasks, in submission order
    #[must_use]
    pub fn tasks(&self) -> &[ImageTask] {
        &self.tasks
    }

    /// Look up one task
    #[must_use]
    pub fn get(&self, id: TaskId) -> Option<&ImageTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// First pending task in submission order, if any
    #[must_use]
    pub fn next_pending(&self) -> Option<TaskId> {
        self.tasks
            .iter()
            .find(|t| t.status == TaskStatus::Pending)
            .map(|t| t.id)
    }

    /// Transition `Pending -> Processing` and hand out the source bytes.
    ///
    /// Refuses while another task is in flight; at most one task is
    /// `Processing` at any instant.
    pub fn dispatch(&mut self, id: TaskId) -> Option<Bytes> {
        if self.tasks.iter().any(|t| t.status == TaskStatus::Processing) {
            debug!(%id, "dispatch refused: another task is in flight");
            return None;
        }
        let task = self.tasks.iter_mut().find(|t| t.id == id)?;
        if task.status != TaskStatus::Pending {
            return None;
        }
        task.status = TaskStatus::Processing;
        debug!(%id, "task dispatched");
        Some(task.source.clone())
    }

    /// Transition `Processing -> Completed`, storing the result.
    ///
    /// Returns `false` without touching anything when the task no longer
    /// exists or is not in flight; this is the stale-result guard for calls that
    /// resolve after their task was removed.
    pub fn complete(&mut self, id: TaskId, result: Bytes) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            debug!(%id, "stale completion discarded");
            return false;
        };
        if task.status != TaskStatus::Processing {
            debug!(%id, status = ?task.status, "completion ignored for non-processing task");
            return false;
        }
        task.result = Some(result);
        task.error_detail = None;
        task.status = TaskStatus::Completed;
        debug!(%id, "task completed");
        true
    }

    /// Transition `Processing -> Error`, recording the cause.
    ///
    /// Same stale-result semantics as [`Self::complete`].
    pub fn fail(&mut self, id: TaskId, detail: String) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            debug!(%id, "stale failure discarded");
            return false;
        };
        if task.status != TaskStatus::Processing {
            debug!(%id, status = ?task.status, "failure ignored for non-processing task");
            return false;
        }
        task.result = None;
        task.error_detail = Some(detail);
        task.status = TaskStatus::Error;
        debug!(%id, "task failed");
        true
    }

    /// Remove one task regardless of status, releasing its bytes.
    ///
    /// Irreversible; the relative order of the remaining tasks is unchanged.
    pub fn remove(&mut self, id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        before != self.tasks.len()
    }

    /// Clear the queue, releasing all owned resources
    pub fn reset(&mut self) {
        self.tasks.clear();
    }

    /// Recompute aggregate counters from the task list
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            total: self.tasks.len(),
            ..QueueStats::default()
        };
        for task in &self.tasks {
            match task.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Processing => stats.processing += 1,
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Error => stats.failed += 1,
            }
        }
        stats
    }
}
