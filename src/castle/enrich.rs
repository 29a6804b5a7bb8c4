//! Pre-generation enrichment of castle records

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::batch::WorkItem;
use crate::castle::model::CastleRecord;
use crate::castle::CastleError;

/// Adds external data to a record before narrative generation
#[async_trait]
pub trait Enricher: Send + Sync {
    /// Return the enriched record. An error fails only this castle.
    async fn enrich(&self, record: CastleRecord) -> Result<CastleRecord, CastleError>;
}

/// Passes records through untouched
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEnricher;

#[async_trait]
impl Enricher for NoopEnricher {
    async fn enrich(&self, record: CastleRecord) -> Result<CastleRecord, CastleError> {
        Ok(record)
    }
}

/// Merges fixed JSON data into `raw_data`, looked up by natural key.
///
/// A matched record also gains the enricher's source name in
/// `external_sources`.
#[derive(Debug, Clone)]
pub struct StaticEnricher {
    source_name: String,
    entries: HashMap<String, Map<String, Value>>,
}

impl StaticEnricher {
    /// Empty enricher reporting itself as `source_name`
    pub fn new(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            entries: HashMap::new(),
        }
    }

    /// Data to merge into the castle with natural key `key`
    pub fn with_entry(mut self, key: impl Into<String>, data: Map<String, Value>) -> Self {
        self.entries.insert(key.into(), data);
        self
    }

    /// Number of keyed entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries were added
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Enricher for StaticEnricher {
    async fn enrich(&self, mut record: CastleRecord) -> Result<CastleRecord, CastleError> {
        let key = record.key();
        let Some(data) = self.entries.get(&key) else {
            return Ok(record);
        };

        for (field, value) in data {
            record.raw_data.insert(field.clone(), value.clone());
        }
        if !record.external_sources.contains(&self.source_name) {
            record.external_sources.push(self.source_name.clone());
        }

        debug!(castle = %key, fields = data.len(), source = %self.source_name, "Enriched castle");
        Ok(record)
    }
}
