//! Progress-callback trait for per-stage pipeline events.
//!
//! Inject an [`Arc<dyn StageProgressCallback>`] via
//! [`crate::convert::ConversionPipeline::with_progress`] to receive events as
//! each stage starts and finishes. Callers can forward them to a broadcast
//! channel, a job table, or a terminal spinner.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docconv::{StageProgressCallback, StageResult};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct FailureCounter {
//!     failed: AtomicUsize,
//! }
//!
//! impl StageProgressCallback for FailureCounter {
//!     fn on_stage_complete(&self, result: &StageResult) {
//!         if !result.succeeded {
//!             self.failed.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! }
//! ```

use crate::report::{StageReport, StageResult};
use std::sync::Arc;

/// Called by the pipeline as it runs each stage.
///
/// Runs for different requests may share one callback concurrently, so
/// implementations must be `Send + Sync`. All methods default to no-ops.
pub trait StageProgressCallback: Send + Sync {
    /// Called once the destination folder exists, before the first stage.
    ///
    /// # Arguments
    /// * `total_stages` — stages this run will attempt
    fn on_run_start(&self, total_stages: usize) {
        let _ = total_stages;
    }

    /// Called just before a stage is invoked.
    fn on_stage_start(&self, stage_name: &str) {
        let _ = stage_name;
    }

    /// Called with each recorded stage result.
    fn on_stage_complete(&self, result: &StageResult) {
        let _ = result;
    }

    /// Called once with the finished report, including aborted runs.
    fn on_run_complete(&self, report: &StageReport) {
        let _ = report;
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl StageProgressCallback for NoopProgressCallback {}

/// Convenience alias for the type held by the pipeline.
pub type ProgressCallback = Arc<dyn StageProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StageError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        total: AtomicUsize,
        started: Mutex<Vec<String>>,
        failures: AtomicUsize,
    }

    impl StageProgressCallback for TrackingCallback {
        fn on_run_start(&self, total_stages: usize) {
            self.total.store(total_stages, Ordering::SeqCst);
        }

        fn on_stage_start(&self, stage_name: &str) {
            self.started.lock().unwrap().push(stage_name.to_string());
        }

        fn on_stage_complete(&self, result: &StageResult) {
            if !result.succeeded {
                self.failures.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(4);
        cb.on_stage_start("processThumb");
        cb.on_stage_complete(&StageResult::success("processThumb", ""));
        cb.on_run_complete(&StageReport::default());
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_run_start(3);
        tracker.on_stage_start("processThumb");
        tracker.on_stage_complete(&StageResult::success("processThumb", ""));
        tracker.on_stage_start("processSWF");
        tracker.on_stage_complete(&StageResult::failure(
            "processSWF",
            StageError::Timeout { millis: 1000 },
        ));

        assert_eq!(tracker.total.load(Ordering::SeqCst), 3);
        assert_eq!(
            *tracker.started.lock().unwrap(),
            vec!["processThumb".to_string(), "processSWF".to_string()]
        );
        assert_eq!(tracker.failures.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_run_start(3);
        cb.on_stage_start("processXML");
    }
}
