use crate::sink::{OutcomeRecord, ResultSink, SinkError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// In-memory outcome storage
#[derive(Clone, Default)]
pub struct MemorySink {
    records: Arc<DashMap<String, OutcomeRecord>>,
}

impl MemorySink {
    /// Create an empty in-memory sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.records.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn setup(&self) -> Result<(), SinkError> {
        Ok(())
    }

    async fn upsert(&self, record: &OutcomeRecord) -> Result<(), SinkError> {
        record.validate()?;
        self.records.insert(record.key.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<OutcomeRecord>, SinkError> {
        Ok(self.records.get(key).map(|entry| entry.value().clone()))
    }

    async fn scan(&self) -> Result<Vec<OutcomeRecord>, SinkError> {
        let mut records: Vec<OutcomeRecord> =
            self.records.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }

    async fn count(&self) -> Result<usize, SinkError> {
        Ok(self.records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_upsert_overwrites_same_key() {
        let sink = MemorySink::new();
        sink.setup().await.unwrap();

        sink.upsert(&OutcomeRecord::new("X1", json!({"v": 1}), 0.5)).await.unwrap();
        sink.upsert(&OutcomeRecord::new("X1", json!({"v": 2}), 0.9)).await.unwrap();

        assert_eq!(sink.count().await.unwrap(), 1);
        let stored = sink.get("X1").await.unwrap().unwrap();
        assert_eq!(stored.payload, json!({"v": 2}));
        assert_eq!(stored.quality_score, 0.9);
    }

    #[tokio::test]
    async fn test_scan_is_sorted_by_key() {
        let sink = MemorySink::new();
        for key in ["c", "a", "b"] {
            sink.upsert(&OutcomeRecord::new(key, json!(null), 1.0)).await.unwrap();
        }

        let keys: Vec<String> = sink.scan().await.unwrap().into_iter().map(|r| r.key).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(sink.keys(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_invalid_record_is_not_stored() {
        let sink = MemorySink::new();
        let mut record = OutcomeRecord::new("X1", json!({}), 0.5);
        record.quality_score = -0.1;

        assert!(matches!(sink.upsert(&record).await, Err(SinkError::InvalidData(_))));
        assert_eq!(sink.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_key() {
        let sink = MemorySink::new();
        assert!(sink.get("nope").await.unwrap().is_none());
    }
}
