//! Typed stage outputs and their structural validators.
//!
//! Stage schemas are deliberately open: the model regularly returns more
//! than the prompt asked for, so each output validates a required subset of
//! fields and retains every undeclared key-value pair in `extra` instead of
//! rejecting it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// A recovered value that does not satisfy its stage's shape contract.
#[derive(Debug, Error)]
#[error("{stage} output rejected: {detail}")]
pub struct SchemaError {
    pub stage: &'static str,
    pub detail: String,
}

impl SchemaError {
    fn new(stage: &'static str, detail: impl Into<String>) -> Self {
        Self {
            stage,
            detail: detail.into(),
        }
    }
}

/// How much was riding on the decision. Unrecognized model output coerces
/// to `Medium` rather than failing the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stakes {
    Low,
    #[default]
    Medium,
    High,
}

impl Stakes {
    /// Lenient parse; the model writes free text here more often than not.
    pub fn coerce(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "low" | "minor" | "small" => Stakes::Low,
            "high" | "severe" | "critical" | "major" => Stakes::High,
            _ => Stakes::Medium,
        }
    }
}

/// Structured summary of the user's narrative: the decision, both paths,
/// and what was at stake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewOutput {
    pub decision: String,
    pub path_taken: String,
    pub path_not_taken: String,
    pub motivations: Vec<String>,
    pub emotions: Vec<String>,
    pub timeframe: String,
    pub stakes: Stakes,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InterviewOutput {
    pub fn from_value(value: Value) -> Result<Self, SchemaError> {
        let mut map = into_object(value, "interview")?;
        let decision = required_str(&mut map, "interview", "decision")?;
        let path_taken = required_str(&mut map, "interview", "path_taken")?;
        let path_not_taken = required_str(&mut map, "interview", "path_not_taken")?;
        let motivations = string_list(&mut map, "motivations");
        let emotions = string_list(&mut map, "emotions");
        let timeframe = optional_str(&mut map, "timeframe", "unspecified");
        let stakes = match map.remove("stakes") {
            Some(Value::String(s)) => Stakes::coerce(&s),
            Some(other) => {
                map.insert("stakes".to_string(), other);
                Stakes::Medium
            }
            None => Stakes::Medium,
        };
        Ok(Self {
            decision,
            path_taken,
            path_not_taken,
            motivations,
            emotions,
            timeframe,
            stakes,
            extra: map,
        })
    }
}

/// Grounding material for the path not taken: where that life happens and
/// what it tends to look like.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchOutput {
    pub setting: String,
    pub daily_life: String,
    pub typical_outcomes: Vec<String>,
    pub challenges: Vec<String>,
    pub opportunities: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Placeholder text used by the quick pipeline in place of real research.
pub const RESEARCH_PLACEHOLDER: &str = "to be discovered";

impl ResearchOutput {
    pub fn from_value(value: Value) -> Result<Self, SchemaError> {
        let mut map = into_object(value, "research")?;
        let setting = required_str(&mut map, "research", "setting")?;
        let daily_life = optional_str(&mut map, "daily_life", RESEARCH_PLACEHOLDER);
        let typical_outcomes = string_list(&mut map, "typical_outcomes");
        let challenges = string_list(&mut map, "challenges");
        let opportunities = string_list(&mut map, "opportunities");
        Ok(Self {
            setting,
            daily_life,
            typical_outcomes,
            challenges,
            opportunities,
            extra: map,
        })
    }

    /// The degraded-mode stand-in: list fields empty, descriptive fields
    /// set to [`RESEARCH_PLACEHOLDER`]. Same shape as a real output.
    pub fn placeholder() -> Self {
        Self {
            setting: RESEARCH_PLACEHOLDER.to_string(),
            daily_life: RESEARCH_PLACEHOLDER.to_string(),
            typical_outcomes: Vec::new(),
            challenges: Vec::new(),
            opportunities: Vec::new(),
            extra: Map::new(),
        }
    }
}

/// The persona blueprint produced by the architect stage. `name` and
/// `summary` double as the display fields on the final record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaOutput {
    pub name: String,
    pub summary: String,
    pub backstory: String,
    pub voice: String,
    pub traits: Vec<String>,
    pub current_life: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PersonaOutput {
    pub fn from_value(value: Value) -> Result<Self, SchemaError> {
        let mut map = into_object(value, "architect")?;
        let name = required_str(&mut map, "architect", "name")?;
        let summary = required_str(&mut map, "architect", "summary")?;
        let backstory = required_str(&mut map, "architect", "backstory")?;
        let voice = optional_str(&mut map, "voice", "");
        let traits = string_list(&mut map, "traits");
        let current_life = optional_str(&mut map, "current_life", "");
        Ok(Self {
            name,
            summary,
            backstory,
            voice,
            traits,
            current_life,
            extra: map,
        })
    }
}

fn into_object(value: Value, stage: &'static str) -> Result<Map<String, Value>, SchemaError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(SchemaError::new(
            stage,
            format!("expected a JSON object, got {}", type_name(&other)),
        )),
    }
}

fn required_str(
    map: &mut Map<String, Value>,
    stage: &'static str,
    key: &str,
) -> Result<String, SchemaError> {
    match map.remove(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s),
        Some(Value::String(_)) => Err(SchemaError::new(
            stage,
            format!("field `{key}` must be a non-empty string"),
        )),
        Some(other) => Err(SchemaError::new(
            stage,
            format!("field `{key}` must be a string, got {}", type_name(&other)),
        )),
        None => Err(SchemaError::new(
            stage,
            format!("missing required field `{key}`"),
        )),
    }
}

/// Missing or mistyped optional strings fall back to a default; a mistyped
/// value is kept in `extra` rather than discarded.
fn optional_str(map: &mut Map<String, Value>, key: &str, default: &str) -> String {
    match map.remove(key) {
        Some(Value::String(s)) => s,
        Some(other) => {
            map.insert(key.to_string(), other);
            default.to_string()
        }
        None => default.to_string(),
    }
}

/// String arrays are lenient: a bare string becomes a one-element list,
/// non-string elements are dropped, and a mistyped value moves to `extra`.
fn string_list(map: &mut Map<String, Value>, key: &str) -> Vec<String> {
    match map.remove(key) {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) => vec![s],
        Some(other) => {
            map.insert(key.to_string(), other);
            Vec::new()
        }
        None => Vec::new(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
