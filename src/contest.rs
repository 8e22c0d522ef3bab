//! Contest records, line setups, the normalized append payload, and the
//! lenient document decoder used on the read path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{CatchType, EntryId, HookBait, LineId, WaterCharacteristic, WeatherCondition};

/// Substring that marks a ranking as a win, matched case-insensitively.
pub const WIN_MARKER: &str = "gagn";

/// Editing state of an optional numeric field.
///
/// `Unset` is the cleared-input state; it is distinct from zero and, like
/// `Absent`, collapses to no value when the draft is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum NumericInput {
    /// Never touched.
    #[default]
    Absent,
    /// Emptied by the user.
    Unset,
    /// A parsed number.
    Value(f64),
}

impl NumericInput {
    /// Coerces raw input text: blank or unparseable text is `Unset`.
    pub fn from_text(text: &str) -> Self {
        match text.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Self::Value(v),
            _ => Self::Unset,
        }
    }

    /// Collapses the editing state at the submission boundary.
    pub fn value(self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(v),
            Self::Absent | Self::Unset => None,
        }
    }
}

/// One rig configuration as persisted.
///
/// Unset measurements are omitted from the document entirely, never
/// written as zero or null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSetup {
    /// Identifier, unique within the contest.
    pub id: LineId,
    /// Float size in grams.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub float_size: Option<f64>,
    /// Main line diameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_line: Option<f64>,
    /// Pole length in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length_meters: Option<f64>,
    /// Hook model and size.
    #[serde(default)]
    pub hook: String,
    /// Shotting pattern.
    #[serde(default)]
    pub rig_notes: String,
    /// Free remarks.
    #[serde(default)]
    pub remarks: String,
}

/// Normalized payload handed to the repository on submit.
///
/// Carries no id and no creation timestamp: both are assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewContest {
    /// ISO calendar date (`YYYY-MM-DD`).
    pub date: String,
    /// Free-text place name.
    pub location: String,
    /// Total catch weight in grams.
    pub total_weight: f64,
    /// Free-text result label.
    pub ranking: String,
    /// Water state.
    pub water_characteristic: WaterCharacteristic,
    /// Measured temperature in °C.
    pub temperature: Option<f64>,
    /// Observed weather, without duplicates.
    pub weather_conditions: Vec<WeatherCondition>,
    /// Rig configurations, at least one.
    pub lines: Vec<LineSetup>,
    /// Groundbait composition.
    pub groundbait_recipe: String,
    /// Feeding strategy.
    pub feeding_strategy: String,
    /// Hook baits used, without duplicates.
    pub hook_baits: Vec<HookBait>,
    /// Species caught, without duplicates.
    pub catches: Vec<CatchType>,
}

/// Fully materialized contest record as delivered to readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContestEntry {
    /// Store-assigned identifier.
    #[serde(skip)]
    pub id: EntryId,
    /// ISO calendar date (`YYYY-MM-DD`).
    pub date: String,
    /// Free-text place name.
    pub location: String,
    /// Total catch weight in grams.
    pub total_weight: f64,
    /// Free-text result label.
    pub ranking: String,
    /// Water state; `None` when the document carried no known label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub water_characteristic: Option<WaterCharacteristic>,
    /// Measured temperature in °C, persisted as null when absent.
    pub temperature: Option<f64>,
    /// Observed weather.
    pub weather_conditions: Vec<WeatherCondition>,
    /// Rig configurations.
    pub lines: Vec<LineSetup>,
    /// Groundbait composition.
    pub groundbait_recipe: String,
    /// Feeding strategy.
    pub feeding_strategy: String,
    /// Hook baits used.
    pub hook_baits: Vec<HookBait>,
    /// Species caught.
    pub catches: Vec<CatchType>,
    /// Creation timestamp assigned by the store.
    pub created_at: Option<DateTime<Utc>>,
}

impl ContestEntry {
    /// Materializes a stored record from an append payload.
    pub fn from_new(id: EntryId, contest: NewContest, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            date: contest.date,
            location: contest.location,
            total_weight: contest.total_weight,
            ranking: contest.ranking,
            water_characteristic: Some(contest.water_characteristic),
            temperature: contest.temperature,
            weather_conditions: contest.weather_conditions,
            lines: contest.lines,
            groundbait_recipe: contest.groundbait_recipe,
            feeding_strategy: contest.feeding_strategy,
            hook_baits: contest.hook_baits,
            catches: contest.catches,
            created_at: Some(created_at),
        }
    }

    /// True when the ranking text contains [`WIN_MARKER`], ignoring case.
    pub fn is_win(&self) -> bool {
        self.ranking.to_lowercase().contains(WIN_MARKER)
    }

    /// True when `catch` was landed during this contest.
    pub fn has_catch(&self, catch: CatchType) -> bool {
        self.catches.contains(&catch)
    }

    /// Serializes the record into its document shape.
    pub fn to_document(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    /// Decodes a stored document, defaulting every missing or malformed
    /// field instead of failing.
    pub fn from_document(id: EntryId, doc: &Value) -> Self {
        Self {
            id,
            date: text_field(doc, "date"),
            location: text_field(doc, "location"),
            total_weight: number_field(doc, "totalWeight").unwrap_or(0.0),
            ranking: text_field(doc, "ranking"),
            water_characteristic: doc
                .get("waterCharacteristic")
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok()),
            temperature: number_field(doc, "temperature"),
            weather_conditions: label_list(doc, "weatherConditions"),
            lines: doc
                .get("lines")
                .and_then(Value::as_array)
                .map(|lines| lines.iter().map(line_from_document).collect())
                .unwrap_or_default(),
            groundbait_recipe: text_field(doc, "groundbaitRecipe"),
            feeding_strategy: text_field(doc, "feedingStrategy"),
            hook_baits: label_list(doc, "hookBaits"),
            catches: label_list(doc, "catches"),
            created_at: doc
                .get("createdAt")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

fn line_from_document(doc: &Value) -> LineSetup {
    let id = doc
        .get("id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(new_line_id);
    LineSetup {
        id,
        float_size: number_field(doc, "floatSize"),
        main_line: number_field(doc, "mainLine"),
        length_meters: number_field(doc, "lengthMeters"),
        hook: text_field(doc, "hook"),
        rig_notes: text_field(doc, "rigNotes"),
        remarks: text_field(doc, "remarks"),
    }
}

/// Generates a fresh line identifier.
pub fn new_line_id() -> LineId {
    uuid::Uuid::now_v7().to_string()
}

fn text_field(doc: &Value, key: &str) -> String {
    match doc.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn number_field(doc: &Value, key: &str) -> Option<f64> {
    match doc.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

// Unknown labels are dropped rather than failing the whole record.
fn label_list<T: std::str::FromStr>(doc: &Value, key: &str) -> Vec<T> {
    doc.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .filter_map(|s| s.parse().ok())
                .collect()
        })
        .unwrap_or_default()
}
