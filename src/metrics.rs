//! Metrics collection for pipeline runs
//!
//! Prometheus-compatible counters and histograms fed from dispatcher events.
//! Every [`MetricsObserver`] owns its registry, so several pipelines (or
//! tests) in one process never share counters.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::batch::{BatchObserver, BatchTiming, FailureRecord, ProcessingSummary, ProgressEvent};
use crate::Result;

/// Prometheus observer for dispatcher runs
pub struct MetricsObserver {
    registry: Registry,
    items: IntCounterVec,
    item_failures: IntCounterVec,
    batches: IntCounter,
    batch_size: Histogram,
    batch_duration: Histogram,
    runs: IntCounterVec,
}

impl MetricsObserver {
    /// Create an observer with a fresh registry
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let items = IntCounterVec::new(
            Opts::new(
                "castle_pipeline_items_total",
                "Items settled by the dispatcher",
            ),
            &["status"],
        )?;
        let item_failures = IntCounterVec::new(
            Opts::new(
                "castle_pipeline_item_failures_total",
                "Failed items by failure kind",
            ),
            &["kind"],
        )?;
        let batches = IntCounter::new("castle_pipeline_batches_total", "Batches completed")?;
        let batch_size = Histogram::with_opts(
            HistogramOpts::new("castle_pipeline_batch_size", "Items per dispatched batch")
                .buckets(vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0]),
        )?;
        let batch_duration = Histogram::with_opts(
            HistogramOpts::new(
                "castle_pipeline_batch_duration_seconds",
                "Wall-clock time per batch in seconds",
            )
            .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]),
        )?;
        let runs = IntCounterVec::new(
            Opts::new("castle_pipeline_runs_total", "Finished runs by outcome"),
            &["outcome"],
        )?;

        registry.register(Box::new(items.clone()))?;
        registry.register(Box::new(item_failures.clone()))?;
        registry.register(Box::new(batches.clone()))?;
        registry.register(Box::new(batch_size.clone()))?;
        registry.register(Box::new(batch_duration.clone()))?;
        registry.register(Box::new(runs.clone()))?;

        Ok(Self {
            registry,
            items,
            item_failures,
            batches,
            batch_size,
            batch_duration,
            runs,
        })
    }

    /// Registry holding this observer's collectors
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Items counted with `status` ("succeeded" or "failed")
    pub fn items(&self, status: &str) -> u64 {
        self.items.with_label_values(&[status]).get()
    }

    /// Failures counted for a failure kind label
    pub fn failures(&self, kind: &str) -> u64 {
        self.item_failures.with_label_values(&[kind]).get()
    }

    /// Batches completed
    pub fn batches(&self) -> u64 {
        self.batches.get()
    }

    /// Runs finished with `outcome` ("completed", "stopped" or "aborted")
    pub fn runs(&self, outcome: &str) -> u64 {
        self.runs.with_label_values(&[outcome]).get()
    }

    /// Export all metrics in Prometheus text format
    pub fn export(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| crate::PipelineError::Internal(format!("metrics not UTF-8: {}", e)))
    }
}

impl BatchObserver for MetricsObserver {
    fn on_item_failed(&self, failure: &FailureRecord) {
        self.item_failures
            .with_label_values(&[failure.kind.as_str()])
            .inc();
    }

    fn on_batch_completed(&self, progress: &ProgressEvent, timing: &BatchTiming) {
        self.batches.inc();
        self.batch_size.observe(progress.batch_size_actual as f64);
        self.batch_duration.observe(timing.duration.as_secs_f64());
        self.items
            .with_label_values(&["succeeded"])
            .inc_by(timing.succeeded as u64);
        self.items
            .with_label_values(&["failed"])
            .inc_by(timing.failed as u64);
    }

    fn on_run_completed(&self, summary: &ProcessingSummary) {
        let outcome = if summary.aborted {
            "aborted"
        } else if summary.stopped_early {
            "stopped"
        } else {
            "completed"
        };
        self.runs.with_label_values(&[outcome]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::FailureKind;
    use std::time::Duration;
    use uuid::Uuid;

    #[test]
    fn test_counts_follow_events() {
        let metrics = MetricsObserver::new().unwrap();

        metrics.on_item_failed(&FailureRecord {
            item_key: "X2".to_string(),
            error_description: "boom".to_string(),
            kind: FailureKind::Timeout,
            batch_index: 0,
        });
        metrics.on_batch_completed(
            &ProgressEvent {
                batch_index: 0,
                batch_size_actual: 2,
                cumulative_success_count: 1,
                cumulative_total: 2,
                total_items: 3,
            },
            &BatchTiming {
                batch_index: 0,
                size: 2,
                succeeded: 1,
                failed: 1,
                duration: Duration::from_millis(20),
            },
        );
        metrics.on_run_completed(&ProcessingSummary::new(Uuid::new_v4(), 3));

        assert_eq!(metrics.items("succeeded"), 1);
        assert_eq!(metrics.items("failed"), 1);
        assert_eq!(metrics.failures("timeout"), 1);
        assert_eq!(metrics.batches(), 1);

        let text = metrics.export().unwrap();
        assert!(text.contains("castle_pipeline_items_total"));
        assert!(text.contains("castle_pipeline_runs_total{outcome=\"completed\"} 1"));
    }

    #[test]
    fn test_run_outcome_labels() {
        let metrics = MetricsObserver::new().unwrap();

        let mut stopped = ProcessingSummary::new(Uuid::new_v4(), 4);
        stopped.stopped_early = true;
        let mut aborted = ProcessingSummary::new(Uuid::new_v4(), 4);
        aborted.aborted = true;

        metrics.on_run_completed(&stopped);
        metrics.on_run_completed(&aborted);

        assert_eq!(metrics.runs("stopped"), 1);
        assert_eq!(metrics.runs("aborted"), 1);
        assert_eq!(metrics.runs("completed"), 0);
    }

    #[test]
    fn test_instances_do_not_share_counters() {
        let first = MetricsObserver::new().unwrap();
        let second = MetricsObserver::new().unwrap();
        first.batches.inc();

        assert_eq!(first.batches(), 1);
        assert_eq!(second.batches(), 0);
    }
}
