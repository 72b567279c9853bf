//! Per-photo analysis records and the overall conclusion.
//!
//! Model replies are loosely typed: `defects` arrives as a string, a list
//! or not at all, and numbers show up where strings were asked for. All of
//! that is normalized here when a record is read, so downstream code only
//! ever sees plain strings.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::enums::Category;

pub const DEFECT_SEPARATOR: &str = "; ";
pub const EMPTY_MARKER: &str = "—";

/// Render a scalar JSON value as trimmed text. Null, empty strings and
/// containers yield `None`.
pub fn text_value(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Collapse a defects value into one string. Lists are joined with `"; "`,
/// anything that is neither a string nor a list becomes empty.
pub fn normalize_defects(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(text_value)
            .collect::<Vec<_>>()
            .join(DEFECT_SEPARATOR),
        _ => String::new(),
    }
}

fn deserialize_defects<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(normalize_defects).unwrap_or_default())
}

fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(text_value).unwrap_or_default())
}

fn deserialize_index<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_u64().map(|i| i as usize),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Record as the model sends it, before index resolution.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawAnalysisRecord {
    #[serde(default, deserialize_with = "deserialize_index")]
    index: Option<usize>,
    #[serde(default, deserialize_with = "deserialize_text")]
    description: String,
    #[serde(default, deserialize_with = "deserialize_defects")]
    defects: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    overall_state: String,
}

/// Analysis of one photo. `index` is the zero-based position of the photo
/// in the submitted batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub index: usize,
    pub description: String,
    pub defects: String,
    pub overall_state: String,
}

impl AnalysisRecord {
    /// Read one array item. Non-objects are rejected; a missing or
    /// out-of-range index falls back to the item's position.
    pub fn from_value(value: &Value, position: usize, photo_count: usize) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        let raw: RawAnalysisRecord = serde_json::from_value(value.clone()).ok()?;
        let index = raw
            .index
            .filter(|i| *i < photo_count)
            .unwrap_or(position);
        Some(Self {
            index,
            description: raw.description,
            defects: raw.defects,
            overall_state: raw.overall_state,
        })
    }
}

/// All analysis records for one building element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementAnalysis {
    pub category: Category,
    pub records: Vec<AnalysisRecord>,
}

impl ElementAnalysis {
    pub fn new(category: Category, records: Vec<AnalysisRecord>) -> Self {
        Self { category, records }
    }

    pub fn empty(category: Category) -> Self {
        Self::new(category, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record_for(&self, photo_index: usize) -> Option<&AnalysisRecord> {
        self.records.iter().find(|r| r.index == photo_index)
    }

    /// State of the first record that reports one.
    pub fn first_state(&self) -> Option<&str> {
        self.records
            .iter()
            .map(|r| r.overall_state.as_str())
            .find(|s| !s.is_empty())
    }
}

/// Overall technical conclusion across all elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConclusionSummary {
    pub overall_state: String,
    pub defects: String,
    pub recommendations: String,
}

impl ConclusionSummary {
    /// Returned without calling the model when nothing was analyzed.
    pub fn no_data() -> Self {
        Self {
            overall_state: "not determined (no analysis data)".into(),
            defects: EMPTY_MARKER.into(),
            recommendations: "no data for recommendations".into(),
        }
    }

    /// Returned when the conclusion call or its parse fails.
    pub fn generation_failed() -> Self {
        Self {
            overall_state: "error during conclusion generation".into(),
            defects: EMPTY_MARKER.into(),
            recommendations: EMPTY_MARKER.into(),
        }
    }
}
