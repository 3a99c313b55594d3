//! Progress reporting for backend operations

use std::sync::{Arc, Mutex};

/// Stages a backend moves through while processing one image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Loading or warming up the model
    Initializing,
    /// Decoding the input image
    Decoding,
    /// Running the segmentation model
    Inference,
    /// Encoding the output image
    Encoding,
    /// Processing finished
    Completed,
}

impl ProcessingStage {
    /// Stable string key for this stage
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Decoding => "decoding",
            Self::Inference => "inference",
            Self::Encoding => "encoding",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callback invoked with `(stage, current, total)` progress pairs
pub type ProgressFn = Arc<dyn Fn(ProcessingStage, u64, u64) + Send + Sync>;

/// Wrapper enforcing monotonically non-decreasing `(current, total)` pairs
/// within each stage.
///
/// Model libraries occasionally re-emit earlier progress values when they
/// restart an internal phase; observers are promised a non-decreasing
/// sequence per stage, so within-stage regressions are swallowed here. A
/// stage change starts a fresh watermark, since stages count different
/// units.
pub struct MonotonicProgress {
    inner: ProgressFn,
    mark: Mutex<Watermark>,
}

struct Watermark {
    stage: Option<ProcessingStage>,
    current: u64,
    total: u64,
}

impl MonotonicProgress {
    /// Wrap a raw progress callback
    #[must_use]
    pub fn new(inner: ProgressFn) -> Self {
        Self {
            inner,
            mark: Mutex::new(Watermark {
                stage: None,
                current: 0,
                total: 0,
            }),
        }
    }

    /// Report progress, clamping `current` and `total` to their previous
    /// highs within the current stage
    pub fn report(&self, stage: ProcessingStage, current: u64, total: u64) {
        let (current, total) = {
            let mut mark = self.mark.lock().unwrap();
            if mark.stage == Some(stage) {
                mark.current = mark.current.max(current);
                mark.total = mark.total.max(total);
            } else {
                mark.stage = Some(stage);
                mark.current = current;
                mark.total = total;
            }
            (mark.current, mark.total)
        };
        (self.inner)(stage, current, total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording() -> (ProgressFn, Arc<Mutex<Vec<(u64, u64)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let cb: ProgressFn = Arc::new(move |_stage, current, total| {
            sink.lock().unwrap().push((current, total));
        });
        (cb, seen)
    }

    #[test]
    fn test_monotonic_progress_passes_increasing_values() {
        let (cb, seen) = recording();
        let progress = MonotonicProgress::new(cb);

        progress.report(ProcessingStage::Inference, 1, 10);
        progress.report(ProcessingStage::Inference, 5, 10);
        progress.report(ProcessingStage::Inference, 10, 10);

        assert_eq!(*seen.lock().unwrap(), vec![(1, 10), (5, 10), (10, 10)]);
    }

    #[test]
    fn test_monotonic_progress_clamps_regressions() {
        let (cb, seen) = recording();
        let progress = MonotonicProgress::new(cb);

        progress.report(ProcessingStage::Inference, 7, 10);
        progress.report(ProcessingStage::Inference, 3, 10);

        assert_eq!(*seen.lock().unwrap(), vec![(7, 10), (7, 10)]);
    }

    #[test]
    fn test_stage_change_resets_the_watermark() {
        let (cb, seen) = recording();
        let progress = MonotonicProgress::new(cb);

        // A finished init must not inflate the first inference report.
        progress.report(ProcessingStage::Initializing, 1, 1);
        progress.report(ProcessingStage::Inference, 0, 100);
        progress.report(ProcessingStage::Inference, 40, 100);

        assert_eq!(*seen.lock().unwrap(), vec![(1, 1), (0, 100), (40, 100)]);
    }

    #[test]
    fn test_stage_keys_are_stable() {
        assert_eq!(ProcessingStage::Inference.as_str(), "inference");
        assert_eq!(ProcessingStage::Completed.to_string(), "completed");
    }
}
