//! Castle narrative pipeline
//!
//! Dedup, translate, enrich, generate, score and persist, one castle per
//! dispatcher item.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::batch::{BatchDispatcher, ProcessingSummary, WorkItem};
use crate::castle::enrich::{Enricher, NoopEnricher};
use crate::castle::model::{deduplicate, CastleRecord, SourceCastle};
use crate::castle::narrative::NarrativeGenerator;
use crate::castle::quality::record_quality;
use crate::castle::translate::to_record;
use crate::castle::CastleError;
use crate::config::PipelineConfig;
use crate::sink::{OutcomeRecord, SqliteSink};
use crate::Result;

/// Runs castles through the dispatcher and stores one narrative per castle
pub struct NarrativePipeline {
    dispatcher: BatchDispatcher,
    enricher: Arc<dyn Enricher>,
    generator: NarrativeGenerator,
}

impl NarrativePipeline {
    /// Pipeline without enrichment
    pub fn new(dispatcher: BatchDispatcher) -> Self {
        Self {
            dispatcher,
            enricher: Arc::new(NoopEnricher),
            generator: NarrativeGenerator::new(),
        }
    }

    /// Validate `config`, open its SQLite sink and build a pipeline on it
    pub async fn from_config(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        let sink = SqliteSink::connect(config.sink_config()).await?;
        let dispatcher = BatchDispatcher::new(config.dispatcher_config(), Arc::new(sink));
        Ok(Self::new(dispatcher))
    }

    /// Replace the enricher
    pub fn with_enricher(mut self, enricher: Arc<dyn Enricher>) -> Self {
        self.enricher = enricher;
        self
    }

    /// Dispatcher driving the runs, e.g. to reach its stop control
    pub fn dispatcher(&self) -> &BatchDispatcher {
        &self.dispatcher
    }

    /// Deduplicate extracted castles, translate them and process the result
    pub async fn process_sources(&self, sources: Vec<SourceCastle>) -> Result<ProcessingSummary> {
        let records = deduplicate(sources).iter().map(to_record).collect();
        self.process(records).await
    }

    /// Generate and store narratives for `castles`.
    ///
    /// Castles repeating an earlier natural key are dropped before dispatch.
    #[instrument(skip_all, fields(castles = castles.len()))]
    pub async fn process(&self, castles: Vec<CastleRecord>) -> Result<ProcessingSummary> {
        let mut seen = HashSet::new();
        let castles: Vec<CastleRecord> = castles
            .into_iter()
            .filter(|castle| seen.insert(castle.key()))
            .collect();

        info!(unique_castles = castles.len(), "Generating narratives");

        let enricher = Arc::clone(&self.enricher);
        let generator = self.generator;

        self.dispatcher
            .run(castles, move |castle: CastleRecord| {
                let enricher = Arc::clone(&enricher);
                async move { narrate(castle, enricher.as_ref(), &generator).await }
            })
            .await
    }
}

async fn narrate(
    castle: CastleRecord,
    enricher: &dyn Enricher,
    generator: &NarrativeGenerator,
) -> std::result::Result<OutcomeRecord, CastleError> {
    let start = Instant::now();
    let key = castle.key();

    let castle = enricher.enrich(castle).await?;
    let narrative = generator.generate(&castle);
    let quality = record_quality(&castle);

    let mut payload = serde_json::to_value(&narrative)?;
    if let Value::Object(fields) = &mut payload {
        fields.insert(
            "processingMetadata".to_string(),
            json!({
                "processingTimeMs": start.elapsed().as_secs_f64() * 1000.0,
                "dataQuality": quality,
                "sourceCount": castle.external_sources.len(),
            }),
        );
    }

    Ok(OutcomeRecord::new(key, payload, quality))
}
