//! Shared services for backends and the queue controller

pub mod preview;
pub mod progress;

pub use preview::make_preview;
pub use progress::{MonotonicProgress, ProcessingStage, ProgressFn};
