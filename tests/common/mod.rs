#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use castle_pipeline::batch::{
    BatchObserver, BatchTiming, DispatcherConfig, FailureRecord, ProcessingSummary, ProgressEvent,
};
use castle_pipeline::sink::{MemorySink, OutcomeRecord, ResultSink, SinkError};
use parking_lot::Mutex;

/// Dispatcher config without pacing
pub fn fast_config(batch_size: usize) -> DispatcherConfig {
    DispatcherConfig::default()
        .with_batch_size(batch_size)
        .with_pacing_delay(Duration::ZERO)
}

pub fn keys(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Keeps every event it sees
#[derive(Default)]
pub struct RecordingObserver {
    pub started: Mutex<Vec<(usize, usize)>>,
    pub failures: Mutex<Vec<FailureRecord>>,
    pub progress: Mutex<Vec<ProgressEvent>>,
    pub timings: Mutex<Vec<BatchTiming>>,
    pub summaries: Mutex<Vec<ProcessingSummary>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl BatchObserver for RecordingObserver {
    fn on_batch_started(&self, batch_index: usize, batch_size: usize) {
        self.started.lock().push((batch_index, batch_size));
    }

    fn on_item_failed(&self, failure: &FailureRecord) {
        self.failures.lock().push(failure.clone());
    }

    fn on_batch_completed(&self, progress: &ProgressEvent, timing: &BatchTiming) {
        self.progress.lock().push(progress.clone());
        self.timings.lock().push(timing.clone());
    }

    fn on_run_completed(&self, summary: &ProcessingSummary) {
        self.summaries.lock().push(summary.clone());
    }
}

/// Memory sink that rejects writes for selected keys
#[derive(Clone, Default)]
pub struct RejectingSink {
    inner: MemorySink,
    rejected: Arc<HashSet<String>>,
}

impl RejectingSink {
    pub fn rejecting(keys: &[&str]) -> Self {
        Self {
            inner: MemorySink::new(),
            rejected: Arc::new(keys.iter().map(|k| k.to_string()).collect()),
        }
    }

    pub fn stored_keys(&self) -> Vec<String> {
        self.inner.keys()
    }
}

#[async_trait]
impl ResultSink for RejectingSink {
    async fn setup(&self) -> Result<(), SinkError> {
        Ok(())
    }

    async fn upsert(&self, record: &OutcomeRecord) -> Result<(), SinkError> {
        if self.rejected.contains(&record.key) {
            return Err(SinkError::WriteFailed(format!(
                "disk full while writing '{}'",
                record.key
            )));
        }
        self.inner.upsert(record).await
    }

    async fn get(&self, key: &str) -> Result<Option<OutcomeRecord>, SinkError> {
        self.inner.get(key).await
    }

    async fn scan(&self) -> Result<Vec<OutcomeRecord>, SinkError> {
        self.inner.scan().await
    }

    async fn count(&self) -> Result<usize, SinkError> {
        self.inner.count().await
    }
}
