//! Castle data shapes and source loading

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::batch::WorkItem;
use crate::Result;

/// Latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Degrees north
    pub latitude: f64,
    /// Degrees east
    pub longitude: f64,
}

impl Coordinates {
    /// Build from latitude and longitude
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    fn identity(&self) -> (u64, u64) {
        (self.latitude.to_bits(), self.longitude.to_bits())
    }
}

/// Castle as produced by the extraction stage.
///
/// Reads both snake_case keys and the camelCase keys of extractor exports
/// (`castleName`, `yearBuilt`, `shortDescription`, ...). Coordinates may be an
/// object or a `[latitude, longitude]` pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceCastle {
    /// Identifier within the originating source
    pub id: String,
    /// Castle name as the source spells it
    #[serde(alias = "castleName")]
    pub name: String,
    /// Country name
    pub country: String,
    /// Town or region
    pub location: String,
    /// Position, when the source has one
    pub coordinates: Option<Coordinates>,
    /// Style label, e.g. "Norman" or "Gothic Revival"
    #[serde(alias = "architecturalStyle")]
    pub architectural_style: String,
    /// Free text such as "1068" or "c. 1200"
    #[serde(alias = "yearBuilt")]
    pub year_built: String,
    /// Short description text
    #[serde(alias = "shortDescription")]
    pub description: String,
    /// Source name: wikidata, osm, wikipedia...
    pub source: String,
    /// Link back to the source entry
    #[serde(alias = "sourceUrl")]
    pub source_url: String,
    /// UNESCO listing, if any
    #[serde(alias = "unescoStatus")]
    pub unesco_status: Option<String>,
    /// When the castle was extracted, as text
    #[serde(alias = "extractionTimestamp")]
    pub extraction_timestamp: String,
}

impl SourceCastle {
    /// Minimal castle with a name and country
    pub fn new(name: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            country: country.into(),
            ..Self::default()
        }
    }
}

/// Unified castle shape consumed by narrative generation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CastleRecord {
    /// Castle name
    pub name: String,
    /// Town or region
    pub location: String,
    /// Country name
    pub country: String,
    /// Position, when known
    pub coordinates: Option<Coordinates>,
    /// Construction year parsed from the source text
    pub built_year: Option<i32>,
    /// Style label
    pub architectural_style: String,
    /// Periods implied by style and year, first seen first
    pub historical_periods: Vec<String>,
    /// Ruler names found in the description
    pub notable_rulers: Vec<String>,
    /// Short event lines found in the description
    pub military_events: Vec<String>,
    /// Cultural theme tags
    pub cultural_themes: Vec<String>,
    /// Sources that contributed to this record
    pub external_sources: Vec<String>,
    /// Description text
    pub description: String,
    /// Extra data merged in by enrichers
    pub raw_data: Map<String, Value>,
}

impl CastleRecord {
    /// Record with just the identifying fields set
    pub fn new(
        name: impl Into<String>,
        location: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            country: country.into(),
            ..Self::default()
        }
    }
}

impl WorkItem for CastleRecord {
    fn key(&self) -> String {
        natural_key(&self.name, &self.location)
    }
}

/// Sink key for a castle: `name|location`, or `name` when location is empty
pub fn natural_key(name: &str, location: &str) -> String {
    if location.is_empty() {
        name.to_string()
    } else {
        format!("{}|{}", name, location)
    }
}

/// Drop castles that repeat an earlier (case-insensitive name, coordinates)
/// pair. Order is preserved and the first occurrence wins.
pub fn deduplicate(castles: Vec<SourceCastle>) -> Vec<SourceCastle> {
    let before = castles.len();
    let mut seen = HashSet::new();

    let unique: Vec<SourceCastle> = castles
        .into_iter()
        .filter(|castle| {
            let identity = (
                castle.name.to_lowercase(),
                castle.coordinates.as_ref().map(Coordinates::identity),
            );
            seen.insert(identity)
        })
        .collect();

    debug!(
        before = before,
        after = unique.len(),
        "Deduplicated source castles"
    );
    unique
}

/// Load extracted castles from a JSON array file
pub fn load_source_castles(path: impl AsRef<Path>) -> Result<Vec<SourceCastle>> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let castles: Vec<SourceCastle> = serde_json::from_str(&contents)?;
    info!(
        path = %path.as_ref().display(),
        count = castles.len(),
        "Loaded source castles"
    );
    Ok(castles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_natural_key() {
        assert_eq!(natural_key("Bran Castle", "Bran"), "Bran Castle|Bran");
        assert_eq!(natural_key("Bran Castle", ""), "Bran Castle");

        let record = CastleRecord::new("Alhambra", "Granada", "Spain");
        assert_eq!(record.key(), "Alhambra|Granada");
    }

    #[test]
    fn test_deduplicate_first_wins() {
        let mut first = SourceCastle::new("Warwick Castle", "United Kingdom");
        first.coordinates = Some(Coordinates::new(52.279, -1.585));
        first.source = "wikidata".to_string();

        let mut repeat = first.clone();
        repeat.name = "WARWICK CASTLE".to_string();
        repeat.source = "osm".to_string();

        let mut elsewhere = first.clone();
        elsewhere.coordinates = Some(Coordinates::new(10.0, 10.0));

        let other = SourceCastle::new("Chambord", "France");

        let unique = deduplicate(vec![first, repeat, other, elsewhere]);
        let names: Vec<_> = unique.iter().map(|c| c.name.as_str()).collect();

        assert_eq!(names, vec!["Warwick Castle", "Chambord", "Warwick Castle"]);
        assert_eq!(unique[0].source, "wikidata");
    }

    #[test]
    fn test_load_source_castles_with_missing_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"name": "Neuschwanstein", "country": "Germany", "year_built": "1869"}},
               {{"name": "Bodiam", "coordinates": {{"latitude": 51.0, "longitude": 0.5}}}}]"#
        )
        .unwrap();

        let castles = load_source_castles(file.path()).unwrap();
        assert_eq!(castles.len(), 2);
        assert_eq!(castles[0].year_built, "1869");
        assert!(castles[0].coordinates.is_none());
        assert_eq!(castles[1].coordinates, Some(Coordinates::new(51.0, 0.5)));
    }

    #[test]
    fn test_load_extractor_export_format() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{
                "id": "Q1",
                "castleName": "Warwick Castle",
                "country": "United Kingdom",
                "location": "Warwick",
                "coordinates": [52.279, -1.585],
                "architecturalStyle": "Norman",
                "yearBuilt": "1068",
                "shortDescription": "Built by King William.",
                "source": "wikidata",
                "sourceUrl": "https://www.wikidata.org/wiki/Q1",
                "unescoStatus": null,
                "extractionTimestamp": "2024-01-01T00:00:00"
            }}]"#
        )
        .unwrap();

        let castles = load_source_castles(file.path()).unwrap();
        let warwick = &castles[0];
        assert_eq!(warwick.name, "Warwick Castle");
        assert_eq!(warwick.architectural_style, "Norman");
        assert_eq!(warwick.year_built, "1068");
        assert_eq!(warwick.description, "Built by King William.");
        assert_eq!(warwick.source_url, "https://www.wikidata.org/wiki/Q1");
        assert_eq!(warwick.coordinates, Some(Coordinates::new(52.279, -1.585)));
        assert!(warwick.unesco_status.is_none());
        assert_eq!(warwick.extraction_timestamp, "2024-01-01T00:00:00");
    }
}
