//! Template-based cultural narratives
//!
//! Generation is a pure function of the castle record; no state, no I/O.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::castle::model::CastleRecord;

const MAX_RULER_STORIES: usize = 3;

/// Narrative generated for one castle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Narrative {
    /// Castle the narrative is about
    pub castle_name: String,
    /// Paragraph on style, period and heritage
    pub cultural_significance: String,
    /// Ruler legends, plus the builder's legend for Gothic castles
    pub legends: Vec<Legend>,
    /// One entry per recorded military event
    pub historical_events: Vec<HistoricalEvent>,
    /// Keyed by ruler name
    pub ruler_biographies: BTreeMap<String, RulerBiography>,
    /// Life in and around the castle
    pub social_history: SocialHistory,
}

/// A legend attached to the castle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Legend {
    /// Short title
    pub title: String,
    /// Story text
    pub narrative: String,
    /// What the legend is loosely based on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub historical_context: Option<String>,
    /// What the legend stands for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbolism: Option<String>,
}

/// Account of one military event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalEvent {
    /// Event line as extracted from the description
    pub name: String,
    /// Sides involved
    pub participants: String,
    /// How it ended
    pub outcome: String,
    /// Effect on the region
    pub significance: String,
    /// How it was fought
    pub tactics: String,
    /// Longer-term consequences
    pub legacy: String,
}

/// Biography of a ruler linked to the castle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulerBiography {
    /// Title and name, e.g. "King William"
    pub full_name: String,
    /// Approximate dates, or "Unknown"
    pub lifespan: String,
    /// Epithets
    pub epithet: String,
    /// Political record
    pub political_achievements: String,
    /// Military record
    pub military_career: String,
    /// Patronage of the arts
    pub cultural_patronage: String,
    /// Building works
    pub architectural_legacy: String,
    /// Circumstances of death
    pub death: String,
    /// How the ruler is remembered
    pub modern_legacy: String,
}

/// Social life around the castle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialHistory {
    /// Household and retainers
    pub feudal_household: String,
    /// Trade and estates
    pub economic_life: String,
    /// Court culture
    pub cultural_life: String,
    /// Day-to-day running
    pub daily_operations: String,
    /// Links abroad
    pub international_connections: String,
}

/// Builds [`Narrative`]s from castle records
#[derive(Debug, Default, Clone, Copy)]
pub struct NarrativeGenerator;

impl NarrativeGenerator {
    /// Create a generator
    pub fn new() -> Self {
        Self
    }

    /// Full narrative for `castle`
    pub fn generate(&self, castle: &CastleRecord) -> Narrative {
        let ruler_biographies = castle
            .notable_rulers
            .iter()
            .take(MAX_RULER_STORIES)
            .map(|ruler| (ruler.clone(), self.ruler_biography(ruler, castle)))
            .collect();

        Narrative {
            castle_name: castle.name.clone(),
            cultural_significance: self.cultural_significance(castle),
            legends: self.legends(castle),
            historical_events: self.historical_events(castle),
            ruler_biographies,
            social_history: self.social_history(castle),
        }
    }

    /// Significance paragraph from style, country and period
    pub fn cultural_significance(&self, castle: &CastleRecord) -> String {
        let style = if castle.architectural_style.is_empty() {
            "medieval"
        } else {
            castle.architectural_style.as_str()
        };

        format!(
            "{} represents the {} architectural achievement and {} heritage, \
             embodying the architectural achievement, political power and cultural synthesis \
             of the {}. It stands as the finest example of {} castle architecture and {}.",
            castle.name,
            style,
            cultural_context(&castle.country),
            primary_period(castle.built_year),
            style,
            cultural_meaning(&castle.architectural_style),
        )
    }

    /// One legend per leading ruler, plus the builder's legend for Gothic castles
    pub fn legends(&self, castle: &CastleRecord) -> Vec<Legend> {
        let mut legends: Vec<Legend> = castle
            .notable_rulers
            .iter()
            .take(MAX_RULER_STORIES)
            .map(|ruler| Legend {
                title: format!("The Spirit of {}", ruler),
                narrative: format!(
                    "The spirit of {} is said to walk the halls of {}, especially during times of political upheaval.",
                    ruler, castle.name
                ),
                historical_context: Some(format!("Based on the historical reign of {}", ruler)),
                symbolism: None,
            })
            .collect();

        if castle.architectural_style.contains("Gothic") {
            legends.push(Legend {
                title: "The Master Builder's Secret".to_string(),
                narrative: format!(
                    "Legend tells that the master builders of {} possessed secret knowledge passed down from ancient craftsmen.",
                    castle.name
                ),
                historical_context: None,
                symbolism: Some(
                    "Represents medieval craftsmanship and divine inspiration".to_string(),
                ),
            });
        }

        legends
    }

    /// One event account per entry in `military_events`
    pub fn historical_events(&self, castle: &CastleRecord) -> Vec<HistoricalEvent> {
        castle
            .military_events
            .iter()
            .map(|event| HistoricalEvent {
                name: event.clone(),
                participants: format!("Besieging forces vs. the garrison of {}", castle.name),
                outcome: "Strategic victory with lasting political consequences".to_string(),
                significance: format!(
                    "Marked a turning point in the balance of power around {}",
                    place(castle)
                ),
                tactics: "Combined siege warfare with diplomatic pressure".to_string(),
                legacy: "Influenced subsequent military and political developments".to_string(),
            })
            .collect()
    }

    /// Biography for `ruler` in the context of `castle`
    pub fn ruler_biography(&self, ruler: &str, castle: &CastleRecord) -> RulerBiography {
        let lifespan = match castle.built_year {
            Some(year) => format!("fl. c. {}", year),
            None => "Unknown".to_string(),
        };

        RulerBiography {
            full_name: ruler.to_string(),
            lifespan,
            epithet: format!("'The Great Builder' and 'Lord of {}'", castle.name),
            political_achievements: format!(
                "Instrumental in establishing {} as a center of regional power",
                castle.name
            ),
            military_career: format!("Led military campaigns defending the {} region", place(castle)),
            cultural_patronage: format!("Patronized arts and architecture at {}", castle.name),
            architectural_legacy: format!(
                "Commissioned major architectural improvements to {}",
                castle.name
            ),
            death: format!("Died at {} and was interred in the castle chapel", castle.name),
            modern_legacy: format!(
                "Remembered as a foundational figure in {}'s history",
                castle.name
            ),
        }
    }

    /// Household, economy and culture of `castle`
    pub fn social_history(&self, castle: &CastleRecord) -> SocialHistory {
        SocialHistory {
            feudal_household: format!(
                "Complex feudal household serving {}'s strategic functions",
                castle.name
            ),
            economic_life: format!(
                "Economic center controlling trade routes and agricultural production around {}",
                place(castle)
            ),
            cultural_life: format!("Cultural patronage and scholarly activities at {}", castle.name),
            daily_operations: format!(
                "Administrative, military and ceremonial functions at {}",
                castle.name
            ),
            international_connections: format!(
                "International diplomatic connections centered on {}",
                castle.name
            ),
        }
    }
}

fn place(castle: &CastleRecord) -> &str {
    if castle.location.is_empty() {
        &castle.name
    } else {
        &castle.location
    }
}

fn cultural_context(country: &str) -> &'static str {
    if country.contains("England") || country.contains("Scotland") {
        "Anglo-Norman"
    } else if country.contains("France") {
        "French royal"
    } else if country.contains("Germany") {
        "Holy Roman Imperial"
    } else if country.contains("Spain") {
        "Iberian medieval"
    } else {
        "European medieval"
    }
}

fn primary_period(built_year: Option<i32>) -> &'static str {
    match built_year {
        Some(year) if year < 1000 => "Early Medieval period",
        Some(year) if year < 1300 => "High Medieval period",
        Some(year) if year < 1500 => "Late Medieval period",
        Some(_) => "Early Modern period",
        None => "Medieval period",
    }
}

fn cultural_meaning(style: &str) -> &'static str {
    match style {
        "Gothic" => "spiritual aspiration and divine authority",
        "Romanesque" => "earthly power and defensive strength",
        "Renaissance" => "humanistic ideals and artistic patronage",
        "Islamic" => "geometric perfection and divine unity",
        _ => "political and cultural authority",
    }
}
