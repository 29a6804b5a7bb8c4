//! Batch dispatcher
//!
//! Runs a per-item async operation over an ordered item list:
//! - Sequential, fixed-size batches with a hard barrier between them
//! - Every item of a batch runs as its own task
//! - Per-item failure isolation (errors, panics, timeouts, rejected writes)
//! - Idempotent upsert of each success into the result sink
//! - Progress events through an injected observer
//! - Optional pacing delay between batches and a stop signal at boundaries

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::batch::control::RunControl;
use crate::batch::observer::{BatchObserver, TracingObserver};
use crate::batch::partition::partition;
use crate::batch::types::{
    BatchReport, DispatcherConfig, FailureKind, FailureRecord, ProcessingSummary, ProgressEvent,
    SinkFailurePolicy, WorkItem,
};
use crate::sink::{OutcomeRecord, ResultSink, SinkError};
use crate::{PipelineError, Result};

type ItemOutcome = std::result::Result<(), (FailureKind, String)>;

/// Drives batched, failure-isolated processing of work items
pub struct BatchDispatcher {
    config: DispatcherConfig,
    sink: Arc<dyn ResultSink>,
    observer: Arc<dyn BatchObserver>,
    control: RunControl,
}

impl BatchDispatcher {
    /// Create a dispatcher writing successes to `sink` and logging through `tracing`
    pub fn new(config: DispatcherConfig, sink: Arc<dyn ResultSink>) -> Self {
        Self {
            config,
            sink,
            observer: Arc::new(TracingObserver),
            control: RunControl::new(),
        }
    }

    /// Replace the observer
    pub fn with_observer(mut self, observer: Arc<dyn BatchObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Use an externally owned stop signal
    pub fn with_control(mut self, control: RunControl) -> Self {
        self.control = control;
        self
    }

    /// Dispatcher configuration
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Handle to the stop signal checked between batches
    pub fn control(&self) -> RunControl {
        self.control.clone()
    }

    /// Process `items` batch by batch.
    ///
    /// Returns a summary even when every item failed. Errors only for an
    /// invalid configuration, or for a rejected sink write under
    /// [`SinkFailurePolicy::Abort`].
    #[instrument(skip_all, fields(item_count = items.len(), batch_size = self.config.batch_size))]
    pub async fn run<I, F, Fut, E>(&self, items: Vec<I>, operation: F) -> Result<ProcessingSummary>
    where
        I: WorkItem,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<OutcomeRecord, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        self.config.validate()?;

        let run_start = Instant::now();
        let total_items = items.len();
        let mut summary = ProcessingSummary::new(Uuid::new_v4(), total_items);

        let batches = partition(items, self.config.batch_size)?;
        let batch_count = batches.len();
        let operation = Arc::new(operation);

        info!(
            run_id = %summary.run_id,
            total_items = total_items,
            batch_count = batch_count,
            pacing_delay_ms = self.config.pacing_delay.as_millis(),
            item_timeout = ?self.config.item_timeout,
            "Starting run"
        );

        for (batch_index, batch) in batches.into_iter().enumerate() {
            if self.control.is_stopped() {
                warn!(
                    run_id = %summary.run_id,
                    batch = batch_index + 1,
                    remaining = total_items - summary.total_submitted,
                    "Stop requested, skipping remaining batches"
                );
                summary.stopped_early = true;
                break;
            }

            self.observer.on_batch_started(batch_index, batch.len());
            let report = self
                .dispatch_batch(batch_index, batch, Arc::clone(&operation))
                .await;
            summary.absorb(&report);

            let progress = ProgressEvent {
                batch_index,
                batch_size_actual: report.submitted,
                cumulative_success_count: summary.total_succeeded,
                cumulative_total: summary.total_submitted,
                total_items,
            };
            self.observer.on_batch_completed(&progress, &report.timing());

            if self.config.sink_failure_policy == SinkFailurePolicy::Abort {
                if let Some(failure) = report
                    .failures
                    .iter()
                    .find(|f| f.kind == FailureKind::SinkWrite)
                {
                    summary.aborted = true;
                    summary.total_duration = run_start.elapsed();
                    self.observer.on_run_completed(&summary);
                    return Err(PipelineError::Sink(SinkError::WriteFailed(format!(
                        "item '{}': {}",
                        failure.item_key, failure.error_description
                    ))));
                }
            }

            let is_last = batch_index + 1 == batch_count;
            if !is_last && !self.config.pacing_delay.is_zero() {
                debug!(delay_ms = self.config.pacing_delay.as_millis(), "Pacing before next batch");
                tokio::time::sleep(self.config.pacing_delay).await;
            }
        }

        summary.total_duration = run_start.elapsed();
        self.observer.on_run_completed(&summary);

        Ok(summary)
    }

    /// Dispatch a single batch and wait for every item to settle.
    ///
    /// Emits failure events but no batch progress event; [`run`](Self::run)
    /// owns the cumulative counts.
    pub async fn run_batch<I, F, Fut, E>(
        &self,
        batch_index: usize,
        batch: Vec<I>,
        operation: F,
    ) -> BatchReport
    where
        I: WorkItem,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<OutcomeRecord, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        self.dispatch_batch(batch_index, batch, Arc::new(operation))
            .await
    }

    #[instrument(skip(self, batch, operation), fields(batch_size = batch.len()))]
    async fn dispatch_batch<I, F, Fut, E>(
        &self,
        batch_index: usize,
        batch: Vec<I>,
        operation: Arc<F>,
    ) -> BatchReport
    where
        I: WorkItem,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<OutcomeRecord, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let batch_start = Instant::now();
        let submitted = batch.len();

        // Spawn every item before awaiting any of them
        let mut tasks = Vec::with_capacity(submitted);
        for item in batch {
            let key = item.key();
            let task = tokio::spawn(Self::execute_item(
                key.clone(),
                item,
                Arc::clone(&operation),
                Arc::clone(&self.sink),
                self.config.item_timeout,
            ));
            tasks.push((key, task));
        }

        // Awaiting in submission order keeps the success list stable
        let mut succeeded = Vec::with_capacity(submitted);
        let mut failures = Vec::new();
        for (key, task) in tasks {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(join_error) => Err((FailureKind::Panicked, join_error.to_string())),
            };

            match outcome {
                Ok(()) => succeeded.push(key),
                Err((kind, error_description)) => {
                    let failure = FailureRecord {
                        item_key: key,
                        error_description,
                        kind,
                        batch_index,
                    };
                    self.observer.on_item_failed(&failure);
                    failures.push(failure);
                }
            }
        }

        BatchReport {
            batch_index,
            submitted,
            succeeded,
            failures,
            duration: batch_start.elapsed(),
        }
    }

    /// Run one item's operation with its timeout, then persist the outcome
    async fn execute_item<I, F, Fut, E>(
        key: String,
        item: I,
        operation: Arc<F>,
        sink: Arc<dyn ResultSink>,
        timeout: Option<Duration>,
    ) -> ItemOutcome
    where
        F: Fn(I) -> Fut + Send + Sync,
        Fut: Future<Output = std::result::Result<OutcomeRecord, E>> + Send,
        E: Display,
    {
        let start = Instant::now();
        debug!(job_id = %key, "Item starting");

        let execution = operation(item);
        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, execution).await {
                Ok(result) => result,
                Err(_) => {
                    return Err((
                        FailureKind::Timeout,
                        format!("operation timed out after {:?}", limit),
                    ))
                }
            },
            None => execution.await,
        };

        let record = result.map_err(|e| (FailureKind::Operation, e.to_string()))?;
        if record.key != key {
            return Err((
                FailureKind::Operation,
                format!("operation produced a record keyed '{}'", record.key),
            ));
        }

        sink.upsert(&record)
            .await
            .map_err(|e| (FailureKind::SinkWrite, e.to_string()))?;

        debug!(
            job_id = %key,
            duration_ms = start.elapsed().as_millis(),
            quality_score = record.quality_score,
            "Item recorded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use serde_json::json;

    fn dispatcher(batch_size: usize) -> (BatchDispatcher, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let config = DispatcherConfig::default()
            .with_batch_size(batch_size)
            .with_pacing_delay(Duration::ZERO);
        (BatchDispatcher::new(config, sink.clone()), sink)
    }

    #[test]
    fn test_dispatcher_configuration() {
        let (dispatcher, _) = dispatcher(7);
        assert_eq!(dispatcher.config().batch_size, 7);
        assert!(!dispatcher.control().is_stopped());
    }

    #[tokio::test]
    async fn test_zero_batch_size_is_configuration_fault() {
        let (dispatcher, _) = dispatcher(0);
        let result = dispatcher
            .run(vec!["a".to_string()], |key: String| async move {
                Ok::<_, String>(OutcomeRecord::new(key, json!(null), 1.0))
            })
            .await;

        assert!(matches!(result, Err(PipelineError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_empty_run() {
        let (dispatcher, sink) = dispatcher(3);
        let summary = dispatcher
            .run(Vec::<String>::new(), |key: String| async move {
                Ok::<_, String>(OutcomeRecord::new(key, json!(null), 1.0))
            })
            .await
            .unwrap();

        assert_eq!(summary.total_submitted, 0);
        assert!(summary.per_batch_timings.is_empty());
        assert_eq!(sink.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mismatched_record_key_is_a_failure() {
        let (dispatcher, sink) = dispatcher(2);
        let summary = dispatcher
            .run(vec!["a".to_string()], |_key: String| async move {
                Ok::<_, String>(OutcomeRecord::new("other", json!(null), 1.0))
            })
            .await
            .unwrap();

        assert_eq!(summary.total_failed, 1);
        assert_eq!(summary.failures[0].kind, FailureKind::Operation);
        assert_eq!(sink.count().await.unwrap(), 0);
    }
}
