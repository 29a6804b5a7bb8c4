//! Injected progress and failure reporting

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::batch::types::{BatchTiming, FailureRecord, ProcessingSummary, ProgressEvent};

/// Receives run events from the dispatcher.
///
/// Callbacks run inline on the dispatcher task and should return quickly.
pub trait BatchObserver: Send + Sync {
    /// A batch is about to be dispatched
    fn on_batch_started(&self, _batch_index: usize, _batch_size: usize) {}

    /// One item failed; called once per failed item
    fn on_item_failed(&self, _failure: &FailureRecord) {}

    /// A batch has fully settled
    fn on_batch_completed(&self, _progress: &ProgressEvent, _timing: &BatchTiming) {}

    /// The run finished, including early stops
    fn on_run_completed(&self, _summary: &ProcessingSummary) {}
}

/// Writes every event to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl BatchObserver for TracingObserver {
    fn on_batch_started(&self, batch_index: usize, batch_size: usize) {
        info!(
            batch = batch_index + 1,
            batch_size = batch_size,
            "Processing batch"
        );
    }

    fn on_item_failed(&self, failure: &FailureRecord) {
        error!(
            job_id = %failure.item_key,
            batch = failure.batch_index + 1,
            kind = %failure.kind,
            error = %failure.error_description,
            "Item failed"
        );
    }

    fn on_batch_completed(&self, progress: &ProgressEvent, timing: &BatchTiming) {
        info!(
            batch = progress.batch_index + 1,
            batch_size = progress.batch_size_actual,
            succeeded = timing.succeeded,
            failed = timing.failed,
            duration_ms = timing.duration.as_millis(),
            processed = progress.cumulative_success_count,
            submitted = progress.cumulative_total,
            total = progress.total_items,
            "Completed batch"
        );
    }

    fn on_run_completed(&self, summary: &ProcessingSummary) {
        let success_rate = summary.success_rate() * 100.0;

        info!(
            run_id = %summary.run_id,
            total_items = summary.total_items,
            submitted = summary.total_submitted,
            succeeded = summary.total_succeeded,
            failed = summary.total_failed,
            stopped_early = summary.stopped_early,
            aborted = summary.aborted,
            success_rate = format!("{:.2}%", success_rate),
            duration_ms = summary.total_duration.as_millis(),
            "Run completed"
        );

        if success_rate < 80.0 && summary.total_submitted > 5 {
            warn!(
                run_id = %summary.run_id,
                success_rate = format!("{:.2}%", success_rate),
                failed = summary.total_failed,
                "High failure rate detected"
            );
        }
    }
}

/// Forwards every event to each wrapped observer in order
#[derive(Default, Clone)]
pub struct FanoutObserver {
    observers: Vec<Arc<dyn BatchObserver>>,
}

impl FanoutObserver {
    /// Create an empty fan-out
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer
    pub fn with(mut self, observer: Arc<dyn BatchObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Number of wrapped observers
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// True when no observer is attached
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl BatchObserver for FanoutObserver {
    fn on_batch_started(&self, batch_index: usize, batch_size: usize) {
        for observer in &self.observers {
            observer.on_batch_started(batch_index, batch_size);
        }
    }

    fn on_item_failed(&self, failure: &FailureRecord) {
        for observer in &self.observers {
            observer.on_item_failed(failure);
        }
    }

    fn on_batch_completed(&self, progress: &ProgressEvent, timing: &BatchTiming) {
        for observer in &self.observers {
            observer.on_batch_completed(progress, timing);
        }
    }

    fn on_run_completed(&self, summary: &ProcessingSummary) {
        for observer in &self.observers {
            observer.on_run_completed(summary);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::types::FailureKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingObserver {
        failures: AtomicUsize,
    }

    impl BatchObserver for CountingObserver {
        fn on_item_failed(&self, _failure: &FailureRecord) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_fanout_reaches_every_observer() {
        let first = Arc::new(CountingObserver::default());
        let second = Arc::new(CountingObserver::default());
        let fanout = FanoutObserver::new()
            .with(first.clone())
            .with(Arc::new(TracingObserver))
            .with(second.clone());

        let failure = FailureRecord {
            item_key: "X2".to_string(),
            error_description: "unreachable".to_string(),
            kind: FailureKind::Operation,
            batch_index: 0,
        };
        fanout.on_item_failed(&failure);
        fanout.on_item_failed(&failure);

        assert_eq!(fanout.len(), 3);
        assert_eq!(first.failures.load(Ordering::SeqCst), 2);
        assert_eq!(second.failures.load(Ordering::SeqCst), 2);
    }
}
