//! Work items, configuration and run reports

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{PipelineError, Result};

/// Input unit identified by a natural key.
///
/// Items are moved into the dispatcher and consumed exactly once.
pub trait WorkItem: Send + Sync + 'static {
    /// Natural key; the outcome record for this item is stored under it
    fn key(&self) -> String;
}

impl WorkItem for String {
    fn key(&self) -> String {
        self.clone()
    }
}

/// What the dispatcher does when the sink rejects a write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkFailurePolicy {
    /// Count the item as failed and keep going
    #[default]
    Downgrade,
    /// Count the item as failed, finish the batch, then end the run with an error
    Abort,
}

/// Dispatcher configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherConfig {
    /// Items per batch
    pub batch_size: usize,
    /// Pause between consecutive batches
    pub pacing_delay: Duration,
    /// Upper bound on a single item's operation
    pub item_timeout: Option<Duration>,
    /// Handling of rejected sink writes
    pub sink_failure_policy: SinkFailurePolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            pacing_delay: Duration::from_secs(1),
            item_timeout: None,
            sink_failure_policy: SinkFailurePolicy::Downgrade,
        }
    }
}

impl DispatcherConfig {
    /// Set the batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the pause between batches; `Duration::ZERO` disables it
    pub fn with_pacing_delay(mut self, delay: Duration) -> Self {
        self.pacing_delay = delay;
        self
    }

    /// Bound every item's operation by `timeout`
    pub fn with_item_timeout(mut self, timeout: Duration) -> Self {
        self.item_timeout = Some(timeout);
        self
    }

    /// Set the sink failure policy
    pub fn with_sink_failure_policy(mut self, policy: SinkFailurePolicy) -> Self {
        self.sink_failure_policy = policy;
        self
    }

    /// Reject configurations that are programming errors
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(PipelineError::Configuration(
                "batch_size must be positive".to_string(),
            ));
        }
        if self.item_timeout == Some(Duration::ZERO) {
            return Err(PipelineError::Configuration(
                "item_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Why an item failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The operation returned an error
    Operation,
    /// The operation exceeded the item timeout
    Timeout,
    /// The operation panicked
    Panicked,
    /// The sink rejected the outcome record
    SinkWrite,
}

impl FailureKind {
    /// Stable label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Operation => "operation",
            FailureKind::Timeout => "timeout",
            FailureKind::Panicked => "panicked",
            FailureKind::SinkWrite => "sink_write",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed item. Logged and reported, never persisted to the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Natural key of the failed item
    pub item_key: String,
    /// Error rendered as text
    pub error_description: String,
    /// Failure classification
    pub kind: FailureKind,
    /// Batch the item belonged to
    pub batch_index: usize,
}

/// Emitted once after every batch settles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Zero-based batch index
    pub batch_index: usize,
    /// Items in this batch (the last batch may be short)
    pub batch_size_actual: usize,
    /// Successes so far in this run
    pub cumulative_success_count: usize,
    /// Items submitted so far in this run
    pub cumulative_total: usize,
    /// Items in the whole run
    pub total_items: usize,
}

/// Timing and counts for one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchTiming {
    /// Zero-based batch index
    pub batch_index: usize,
    /// Items submitted in the batch
    pub size: usize,
    /// Items that succeeded
    pub succeeded: usize,
    /// Items that failed
    pub failed: usize,
    /// Wall time from first submission until the last item settled
    pub duration: Duration,
}

/// Result of dispatching a single batch
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Zero-based batch index
    pub batch_index: usize,
    /// Items submitted
    pub submitted: usize,
    /// Keys of successful items, in submission order
    pub succeeded: Vec<String>,
    /// Failed items, in submission order
    pub failures: Vec<FailureRecord>,
    /// Wall time of the batch
    pub duration: Duration,
}

impl BatchReport {
    /// Summarized timing for this batch
    pub fn timing(&self) -> BatchTiming {
        BatchTiming {
            batch_index: self.batch_index,
            size: self.submitted,
            succeeded: self.succeeded.len(),
            failed: self.failures.len(),
            duration: self.duration,
        }
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingSummary {
    /// Identifier attached to every log line of the run
    pub run_id: Uuid,
    /// Items handed to the dispatcher
    pub total_items: usize,
    /// Items actually dispatched
    pub total_submitted: usize,
    /// Items whose outcome was recorded
    pub total_succeeded: usize,
    /// Items that failed for any reason
    pub total_failed: usize,
    /// One entry per dispatched batch
    pub per_batch_timings: Vec<BatchTiming>,
    /// Every failure of the run, in batch then submission order
    pub failures: Vec<FailureRecord>,
    /// Set when the run was stopped at a batch boundary
    pub stopped_early: bool,
    /// Set when a rejected write ended the run under [`SinkFailurePolicy::Abort`]
    pub aborted: bool,
    /// Wall time of the whole run
    pub total_duration: Duration,
}

impl ProcessingSummary {
    /// Empty summary for a run over `total_items` items
    pub fn new(run_id: Uuid, total_items: usize) -> Self {
        Self {
            run_id,
            total_items,
            total_submitted: 0,
            total_succeeded: 0,
            total_failed: 0,
            per_batch_timings: Vec::new(),
            failures: Vec::new(),
            stopped_early: false,
            aborted: false,
            total_duration: Duration::ZERO,
        }
    }

    /// Fold one batch report into the running totals
    pub fn absorb(&mut self, report: &BatchReport) {
        self.total_submitted += report.submitted;
        self.total_succeeded += report.succeeded.len();
        self.total_failed += report.failures.len();
        self.per_batch_timings.push(report.timing());
        self.failures.extend(report.failures.iter().cloned());
    }

    /// Items never dispatched because the run stopped early
    pub fn remaining(&self) -> usize {
        self.total_items - self.total_submitted
    }

    /// Fraction of submitted items that succeeded; `0.0` when nothing ran
    pub fn success_rate(&self) -> f64 {
        if self.total_submitted == 0 {
            0.0
        } else {
            self.total_succeeded as f64 / self.total_submitted as f64
        }
    }
}
