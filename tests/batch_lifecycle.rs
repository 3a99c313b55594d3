//! End-to-end batch lifecycle tests through the public API


use async_trait::async_trait;
use bgbatch::{
    BatchController, BgBatchError, ControllerConfig, ProcessMode, ProcessOptions, RemovalBackend,
    Result, SourceImage, TaskStatus,
};
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Echoes the input back and records every call; optionally fails the
/// call at a fixed index.
struct RecordingBackend {
    mode: ProcessMode,
    credentials: Mutex<Vec<Option<String>>>,
    calls: AtomicUsize,
    fail_at: Option<usize>,
}

impl RecordingBackend {
    fn new(mode: ProcessMode) -> Self {
        Self {
            mode,
            credentials: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            fail_at: None,
        }
    }

    fn failing_at(mode: ProcessMode, index: usize) -> Self {
        Self {
            fail_at: Some(index),
            ..Self::new(mode)
        }
    }
}

#[async_trait]
impl RemovalBackend for RecordingBackend {
    async fn process(&self, image: &[u8], options: &ProcessOptions) -> Result<Bytes> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.credentials
            .lock()
            .unwrap()
            .push(options.credential.clone());
        if self.fail_at == Some(index) {
            return Err(BgBatchError::network("simulated outage"));
        }
        Ok(Bytes::copy_from_slice(image))
    }

    fn mode(&self) -> ProcessMode {
        self.mode
    }
}

fn controller_with(backend: Arc<RecordingBackend>) -> BatchController {
    let config = ControllerConfig::builder().build().unwrap();
    BatchController::new(config, ProcessMode::Api, backend.clone(), backend)
}

fn source(name: &str, bytes: Bytes) -> SourceImage {
    SourceImage {
        file_name: name.to_string(),
        bytes,
    }
}

#[tokio::test]
async fn test_batch_completes_in_submission_order() {
    let backend = Arc::new(RecordingBackend::new(ProcessMode::Api));
    let controller = controller_with(backend.clone());

    let outcome = controller
        .submit(vec![
            source("a.png", fixtures::png_bytes(4, 4)),
            source("b.png", fixtures::png_bytes(6, 6)),
            source("c.png", fixtures::png_bytes(8, 8)),
        ])
        .unwrap();
    assert_eq!(outcome.accepted.len(), 3);
    assert_eq!(outcome.skipped, 0);

    controller.run().await;

    let tasks = controller.tasks();
    assert_eq!(
        tasks.iter().map(|t| t.file_name()).collect::<Vec<_>>(),
        vec!["a.png", "b.png", "c.png"]
    );
    assert!(tasks.iter().all(|t| t.status() == TaskStatus::Completed));
    assert!(tasks.iter().all(|t| t.result().is_some()));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 3);

    let stats = controller.stats();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.completed, 3);
    assert_eq!(stats.pending + stats.processing + stats.failed, 0);
}

#[tokio::test]
async fn test_invalid_files_are_skipped_not_fatal() {
    let backend = Arc::new(RecordingBackend::new(ProcessMode::Api));
    let controller = controller_with(backend);

    let outcome = controller
        .submit(vec![
            source("real.jpg", fixtures::jpeg_bytes(8, 8)),
            source("notes.txt", fixtures::text_bytes()),
        ])
        .unwrap();

    assert_eq!(outcome.accepted.len(), 1);
    assert_eq!(outcome.skipped, 1);
    assert_eq!(controller.stats().total, 1);

    controller.run().await;
    let task = controller.task(outcome.accepted[0]).unwrap();
    assert_eq!(task.status(), TaskStatus::Completed);
}

#[tokio::test]
async fn test_batch_with_no_valid_image_is_rejected() {
    let backend = Arc::new(RecordingBackend::new(ProcessMode::Api));
    let controller = controller_with(backend);

    let result = controller.submit(vec![source("notes.txt", fixtures::text_bytes())]);
    assert!(matches!(result, Err(BgBatchError::InvalidInput(_))));
    assert_eq!(controller.stats().total, 0);
}

#[tokio::test]
async fn test_one_failure_does_not_abort_the_batch() {
    let backend = Arc::new(RecordingBackend::failing_at(ProcessMode::Api, 0));
    let controller = controller_with(backend);

    controller
        .submit(vec![
            source("first.png", fixtures::png_bytes(4, 4)),
            source("second.png", fixtures::png_bytes(4, 4)),
        ])
        .unwrap();
    controller.run().await;

    let tasks = controller.tasks();
    assert_eq!(tasks[0].status(), TaskStatus::Error);
    assert!(tasks[0].error_detail().is_some());
    assert_eq!(tasks[1].status(), TaskStatus::Completed);

    let stats = controller.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.completed, 1);
}

#[tokio::test]
async fn test_resubmit_failed_task_as_new_task() {
    let backend = Arc::new(RecordingBackend::failing_at(ProcessMode::Api, 0));
    let controller = controller_with(backend);

    let outcome = controller
        .submit(vec![source("flaky.png", fixtures::png_bytes(4, 4))])
        .unwrap();
    let original = outcome.accepted[0];
    controller.run().await;
    assert_eq!(controller.task(original).unwrap().status(), TaskStatus::Error);

    let retry = controller.resubmit(original).unwrap();
    assert_ne!(retry, original);
    controller.run().await;

    // The original record keeps its failure; the retry is a fresh task.
    assert_eq!(controller.task(original).unwrap().status(), TaskStatus::Error);
    assert_eq!(controller.task(retry).unwrap().status(), TaskStatus::Completed);
}

#[tokio::test]
async fn test_credential_reaches_the_backend() {
    let backend = Arc::new(RecordingBackend::new(ProcessMode::Api));
    let controller = controller_with(backend.clone());
    controller.set_credential(Some("secret-key".to_string()));

    controller
        .submit(vec![source("a.png", fixtures::png_bytes(4, 4))])
        .unwrap();
    controller.run().await;

    let seen = backend.credentials.lock().unwrap().clone();
    assert_eq!(seen, vec![Some("secret-key".to_string())]);
}

#[tokio::test]
async fn test_remove_and_reset() {
    let backend = Arc::new(RecordingBackend::new(ProcessMode::Api));
    let controller = controller_with(backend);

    let outcome = controller
        .submit(vec![
            source("keep.png", fixtures::png_bytes(4, 4)),
            source("drop.png", fixtures::png_bytes(4, 4)),
        ])
        .unwrap();

    assert!(controller.remove(outcome.accepted[1]));
    assert_eq!(controller.stats().total, 1);

    controller.run().await;
    assert_eq!(controller.stats().completed, 1);

    controller.reset();
    assert_eq!(controller.stats().total, 0);
    assert!(controller.tasks().is_empty());
}
