//! Field-presence quality scores, capped at 1.0

use crate::castle::model::{CastleRecord, SourceCastle};

const LONG_DESCRIPTION_CHARS: usize = 100;

/// Completeness of an extracted castle
pub fn source_quality(castle: &SourceCastle) -> f64 {
    let mut score: f64 = 0.0;

    if !castle.name.is_empty() {
        score += 0.2;
    }
    if !castle.country.is_empty() {
        score += 0.2;
    }
    if !castle.location.is_empty() {
        score += 0.2;
    }
    if castle.coordinates.is_some() {
        score += 0.2;
    }
    if !castle.year_built.is_empty() {
        score += 0.1;
    }
    if !castle.architectural_style.is_empty() {
        score += 0.1;
    }
    if castle.description.chars().count() > LONG_DESCRIPTION_CHARS {
        score += 0.2;
    }

    score.min(1.0)
}

/// How much material a record gives narrative generation
pub fn record_quality(castle: &CastleRecord) -> f64 {
    let mut score: f64 = 0.0;

    if !castle.name.is_empty() {
        score += 0.2;
    }
    if !castle.location.is_empty() {
        score += 0.2;
    }
    if castle.built_year.is_some() {
        score += 0.2;
    }
    if !castle.architectural_style.is_empty() {
        score += 0.2;
    }
    if !castle.notable_rulers.is_empty() {
        score += 0.1;
    }
    if !castle.military_events.is_empty() {
        score += 0.1;
    }
    if castle.external_sources.len() > 2 {
        score += 0.1;
    }
    let has_summary = castle
        .raw_data
        .get("wikipedia_summary")
        .and_then(|v| v.as_str())
        .is_some_and(|s| !s.is_empty());
    if has_summary {
        score += 0.1;
    }

    score.min(1.0)
}
