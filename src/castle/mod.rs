pub mod enrich;
pub mod model;
pub mod narrative;
pub mod pipeline;
pub mod quality;
pub mod translate;

pub use enrich::{Enricher, NoopEnricher, StaticEnricher};
pub use model::{
    deduplicate, load_source_castles, natural_key, CastleRecord, Coordinates, SourceCastle,
};
pub use narrative::{Narrative, NarrativeGenerator};
pub use pipeline::NarrativePipeline;
pub use quality::{record_quality, source_quality};
pub use translate::to_record;

use thiserror::Error;

/// Failure while turning one castle into an outcome record
#[derive(Error, Debug)]
pub enum CastleError {
    /// Enrichment source failed or returned unusable data
    #[error("Enrichment failed: {0}")]
    Enrichment(String),

    /// Narrative could not be encoded as JSON
    #[error("Narrative serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
