//! Keyed, idempotent persistence of outcome records

mod memory;
pub mod sqlite;

pub use memory::MemorySink;
pub use sqlite::{SqliteSink, SqliteSinkConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors related to outcome persistence
#[derive(Error, Debug)]
pub enum SinkError {
    /// Schema creation or connection setup failed
    #[error("Failed to initialize sink: {0}")]
    SetupFailed(String),

    /// The store rejected a write
    #[error("Failed to write record: {0}")]
    WriteFailed(String),

    /// A stored record could not be read back
    #[error("Failed to read record: {0}")]
    ReadFailed(String),

    /// Bad connection URL, table name or pool settings
    #[error("Invalid sink configuration: {0}")]
    InvalidConfig(String),

    /// Record failed validation or could not be encoded
    #[error("Invalid record data: {0}")]
    InvalidData(String),

    /// Underlying database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// One processed item's outcome, stored under its natural key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    /// Natural key of the work item; unique in the sink
    pub key: String,

    /// Operation output
    pub payload: Value,

    /// Unix timestamp (seconds) when the record was produced
    pub timestamp: f64,

    /// Quality score in `[0, 1]`
    pub quality_score: f64,
}

impl OutcomeRecord {
    /// Create a record stamped with the current time.
    ///
    /// `quality_score` is clamped into `[0, 1]`; NaN becomes `0.0`.
    pub fn new(key: impl Into<String>, payload: Value, quality_score: f64) -> Self {
        Self {
            key: key.into(),
            payload,
            timestamp: now_timestamp(),
            quality_score: clamp_quality(quality_score),
        }
    }

    /// Override the timestamp
    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Check the invariants sinks rely on: a finite timestamp and a
    /// quality score within `[0, 1]`
    pub fn validate(&self) -> Result<(), SinkError> {
        if !self.timestamp.is_finite() {
            return Err(SinkError::InvalidData(format!(
                "record '{}' has non-finite timestamp {}",
                self.key, self.timestamp
            )));
        }
        if !(0.0..=1.0).contains(&self.quality_score) {
            return Err(SinkError::InvalidData(format!(
                "record '{}' has quality score {} outside [0, 1]",
                self.key, self.quality_score
            )));
        }
        Ok(())
    }
}

fn clamp_quality(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Current time as fractional unix seconds
pub fn now_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Storage backend for outcome records.
///
/// Implementations must tolerate concurrent calls from every item task of a
/// batch. Writes to the same key resolve to whichever write the store
/// observes last.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Create the backing schema. Safe to call any number of times.
    async fn setup(&self) -> Result<(), SinkError>;

    /// Insert or overwrite the record stored under `record.key`.
    ///
    /// Records failing [`OutcomeRecord::validate`] are rejected with
    /// [`SinkError::InvalidData`] and nothing is written.
    async fn upsert(&self, record: &OutcomeRecord) -> Result<(), SinkError>;

    /// Read back a record by key
    async fn get(&self, key: &str) -> Result<Option<OutcomeRecord>, SinkError>;

    /// All records, ordered by key
    async fn scan(&self) -> Result<Vec<OutcomeRecord>, SinkError>;

    /// Number of stored records
    async fn count(&self) -> Result<usize, SinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outcome_record_creation() {
        let record = OutcomeRecord::new("Windsor Castle", json!({"legends": []}), 0.8);

        assert_eq!(record.key, "Windsor Castle");
        assert_eq!(record.quality_score, 0.8);
        assert!(record.timestamp > 0.0);
    }

    #[test]
    fn test_quality_score_is_clamped() {
        assert_eq!(OutcomeRecord::new("a", Value::Null, 1.7).quality_score, 1.0);
        assert_eq!(OutcomeRecord::new("b", Value::Null, -0.3).quality_score, 0.0);
        assert_eq!(OutcomeRecord::new("c", Value::Null, f64::NAN).quality_score, 0.0);
    }

    #[test]
    fn test_with_timestamp() {
        let record = OutcomeRecord::new("k", Value::Null, 0.5).with_timestamp(42.5);
        assert_eq!(record.timestamp, 42.5);
    }

    #[test]
    fn test_validate_rejects_out_of_range_fields() {
        assert!(OutcomeRecord::new("ok", Value::Null, 1.0).validate().is_ok());

        let mut too_high = OutcomeRecord::new("high", Value::Null, 0.5);
        too_high.quality_score = 7.5;
        assert!(matches!(too_high.validate(), Err(SinkError::InvalidData(_))));

        let mut nan_score = OutcomeRecord::new("nan", Value::Null, 0.5);
        nan_score.quality_score = f64::NAN;
        assert!(matches!(nan_score.validate(), Err(SinkError::InvalidData(_))));

        let infinite = OutcomeRecord::new("inf", Value::Null, 0.5).with_timestamp(f64::INFINITY);
        assert!(matches!(infinite.validate(), Err(SinkError::InvalidData(_))));
    }
}
