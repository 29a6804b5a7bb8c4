//! Extraction output to narrative input
//!
//! Years, historical periods, rulers, military events and cultural themes are
//! derived with keyword rules over the free-text source fields.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Map;

use crate::castle::model::{CastleRecord, SourceCastle};

lazy_static! {
    static ref FOUR_DIGIT_YEAR: Regex = Regex::new(r"\d{4}").unwrap();
}

const STYLE_PERIODS: &[(&str, &[&str])] = &[
    ("Norman", &["Norman", "Early Medieval"]),
    ("Gothic", &["Gothic", "High Medieval"]),
    ("Gothic Revival", &["Gothic Revival", "Victorian", "19th Century"]),
    ("Renaissance", &["Renaissance", "Early Modern"]),
    ("Islamic", &["Islamic", "Moorish", "Medieval"]),
    ("Romanesque", &["Romanesque", "Medieval"]),
    ("Baroque", &["Baroque", "Early Modern"]),
    ("Byzantine", &["Byzantine", "Early Medieval"]),
];

const RULER_TITLES: &[&str] = &[
    "King", "Queen", "Emperor", "Duke", "Earl", "Baron", "Count", "Prince", "Princess",
];

const EVENT_KEYWORDS: &[&str] = &["siege", "battle", "war", "conquest", "rebellion", "revolution"];

const MAX_RULERS: usize = 3;
const MAX_EVENTS: usize = 3;

/// First four-digit number in `text`
pub fn parse_year(text: &str) -> Option<i32> {
    FOUR_DIGIT_YEAR
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
}

/// Periods implied by the style keywords and the construction year, without
/// duplicates, in first-seen order
pub fn historical_periods(architectural_style: &str, year: Option<i32>) -> Vec<String> {
    let style = architectural_style.to_lowercase();
    let mut periods: Vec<String> = Vec::new();
    let mut push = |period: &str| {
        if !periods.iter().any(|p| p == period) {
            periods.push(period.to_string());
        }
    };

    for (keyword, implied) in STYLE_PERIODS {
        if style.contains(&keyword.to_lowercase()) {
            for period in *implied {
                push(*period);
            }
        }
    }

    if let Some(year) = year {
        let band = match year {
            500..=999 => Some("Early Medieval"),
            1000..=1299 => Some("High Medieval"),
            1300..=1499 => Some("Late Medieval"),
            1500..=1649 => Some("Early Modern"),
            1650..=1799 => Some("Baroque"),
            1800..=1899 => Some("19th Century"),
            y if y >= 1900 => Some("Modern"),
            _ => None,
        };
        if let Some(band) = band {
            push(band);
        }
    }

    periods
}

/// Up to three "Title Name" rulers and three military events from a description
pub fn extract_rulers_and_events(description: &str) -> (Vec<String>, Vec<String>) {
    let mut rulers = Vec::new();
    let mut events = Vec::new();
    if description.trim().is_empty() {
        return (rulers, events);
    }

    let lead: String = description
        .split('.')
        .next()
        .unwrap_or_default()
        .chars()
        .take(50)
        .collect();
    let words: Vec<&str> = description.split_whitespace().collect();

    for (i, word) in words.iter().enumerate() {
        if RULER_TITLES.contains(word) {
            if let Some(next) = words.get(i + 1) {
                rulers.push(format!("{} {}", word, next));
            }
        }

        let lowered = word.to_lowercase();
        if let Some(keyword) = EVENT_KEYWORDS.iter().find(|k| lowered.contains(*k)) {
            events.push(format!("{} at {}...", title_case(keyword), lead));
        }
    }

    rulers.truncate(MAX_RULERS);
    events.truncate(MAX_EVENTS);
    (rulers, events)
}

/// Themes suggested by style and description keywords; falls back to
/// `political_authority`
pub fn cultural_themes(architectural_style: &str, description: &str) -> Vec<String> {
    let style = architectural_style.to_lowercase();
    let description = description.to_lowercase();

    let mut themes = Vec::new();
    if contains_any(&style, &["gothic", "cathedral"]) {
        themes.push("religious_authority");
    }
    if contains_any(&style, &["renaissance", "palace"]) {
        themes.push("artistic_patronage");
    }
    if contains_any(&style, &["fortress", "military"]) {
        themes.push("military_power");
    }
    if contains_any(&description, &["king", "royal", "crown"]) {
        themes.push("royal_authority");
    }
    if contains_any(&description, &["trade", "merchant", "economic"]) {
        themes.push("economic_power");
    }
    if themes.is_empty() {
        themes.push("political_authority");
    }

    themes.into_iter().map(String::from).collect()
}

/// Translate an extracted castle into a narrative record
pub fn to_record(source: &SourceCastle) -> CastleRecord {
    let built_year = parse_year(&source.year_built);
    let (notable_rulers, military_events) = extract_rulers_and_events(&source.description);

    CastleRecord {
        name: source.name.clone(),
        location: source.location.clone(),
        country: source.country.clone(),
        coordinates: source.coordinates,
        built_year,
        architectural_style: source.architectural_style.clone(),
        historical_periods: historical_periods(&source.architectural_style, built_year),
        notable_rulers,
        military_events,
        cultural_themes: cultural_themes(&source.architectural_style, &source.description),
        external_sources: if source.source.is_empty() {
            Vec::new()
        } else {
            vec![source.source.clone()]
        },
        description: source.description.clone(),
        raw_data: Map::new(),
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
