//! Typed step outputs and their JSON contracts
//!
//! Field names are camelCase on the wire to match what the prompts ask for.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A step's typed output with its required-field contract
pub trait StepOutput: DeserializeOwned + Serialize + Send {
    /// Keys that must be present and non-null in the oracle's JSON
    const REQUIRED_FIELDS: &'static [&'static str];

    /// Field-level checks after deserialization (ranges, non-empty strings)
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Check `value` is an object carrying every required field
pub fn check_required(value: &Value, required: &[&str]) -> Result<(), String> {
    let obj = value
        .as_object()
        .ok_or_else(|| format!("expected a JSON object, got {}", json_kind(value)))?;

    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|field| obj.get(*field).is_none_or(Value::is_null))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(format!("missing required field(s): {}", missing.join(", ")))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn non_empty(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{} must not be empty", field))
    } else {
        Ok(())
    }
}

/// Step 1: where the document should live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectorySelection {
    pub selected_directory: String,
    pub reasoning: String,
    pub confidence: f64,
    #[serde(default)]
    pub existing_files: Vec<String>,
    pub directory_purpose: String,
    #[serde(default)]
    pub alternative_options: Vec<AlternativeDirectory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlternativeDirectory {
    pub directory: String,
    #[serde(default)]
    pub reason: String,
}

impl StepOutput for DirectorySelection {
    const REQUIRED_FIELDS: &'static [&'static str] =
        &["selectedDirectory", "reasoning", "confidence", "directoryPurpose"];

    fn validate(&self) -> Result<(), String> {
        non_empty("selectedDirectory", &self.selected_directory)?;
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!("confidence {} is outside [0, 1]", self.confidence));
        }
        Ok(())
    }
}

/// Create a new document or update an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StrategyAction {
    Create,
    Update,
}

impl fmt::Display for StrategyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "CREATE"),
            Self::Update => write!(f, "UPDATE"),
        }
    }
}

/// Step 2: the CREATE/UPDATE decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentStrategy {
    pub action: StrategyAction,
    #[serde(default)]
    pub target_file: Option<String>,
    pub reasoning: String,
    pub content_overlap: f64,
    #[serde(default)]
    pub existing_content_summary: Option<String>,
    #[serde(default)]
    pub user_journey_context: String,
}

impl ContentStrategy {
    /// Target file with empty strings treated as absent
    pub fn target(&self) -> Option<&str> {
        self.target_file.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

impl StepOutput for ContentStrategy {
    const REQUIRED_FIELDS: &'static [&'static str] = &["action", "reasoning", "contentOverlap"];

    fn validate(&self) -> Result<(), String> {
        if !(0.0..=100.0).contains(&self.content_overlap) {
            return Err(format!("contentOverlap {} is outside [0, 100]", self.content_overlap));
        }
        Ok(())
    }
}

/// Step 3 (CREATE only): which documentation pattern to follow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternSelection {
    pub pattern_id: String,
    pub pattern_name: String,
    pub reasoning: String,
    pub required_sections: Vec<String>,
    #[serde(default)]
    pub audience_alignment: String,
    #[serde(default)]
    pub alternative_patterns: Vec<AlternativePattern>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlternativePattern {
    pub pattern_id: String,
    #[serde(default)]
    pub reason: String,
}

impl StepOutput for PatternSelection {
    const REQUIRED_FIELDS: &'static [&'static str] = &["patternId", "patternName", "reasoning", "requiredSections"];

    fn validate(&self) -> Result<(), String> {
        non_empty("patternId", &self.pattern_id)
    }
}

/// Step 4: the generated or updated document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentArtifact {
    pub content: String,
    pub title: String,
    pub filename: String,
    #[serde(default)]
    pub front_matter: BTreeMap<String, String>,
    #[serde(default)]
    pub sections: Vec<ArtifactSection>,
    #[serde(default)]
    pub metadata: ArtifactMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactSection {
    pub heading: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArtifactMetadata {
    pub word_count: u64,
    pub reading_time: String,
    pub technical_level: String,
}

impl StepOutput for ContentArtifact {
    const REQUIRED_FIELDS: &'static [&'static str] = &["content", "title", "filename"];

    fn validate(&self) -> Result<(), String> {
        non_empty("content", &self.content)?;
        non_empty("filename", &self.filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_check_required_lists_missing_and_null() {
        let value = json!({"action": "CREATE", "reasoning": null});
        let err = check_required(&value, ContentStrategy::REQUIRED_FIELDS).unwrap_err();
        assert_eq!(err, "missing required field(s): reasoning, contentOverlap");
    }

    #[test]
    fn test_check_required_rejects_non_object() {
        let err = check_required(&json!([1, 2]), &["a"]).unwrap_err();
        assert!(err.contains("array"));
    }

    #[test]
    fn test_directory_selection_confidence_range() {
        let mut sel: DirectorySelection = serde_json::from_value(json!({
            "selectedDirectory": "docs",
            "reasoning": "r",
            "confidence": 0.9,
            "directoryPurpose": "guides"
        }))
        .unwrap();
        assert!(sel.validate().is_ok());
        assert!(sel.existing_files.is_empty());

        sel.confidence = 1.5;
        assert!(sel.validate().unwrap_err().contains("confidence"));
    }

    #[test]
    fn test_strategy_action_is_uppercase_on_the_wire() {
        let s: ContentStrategy = serde_json::from_value(json!({
            "action": "UPDATE",
            "targetFile": "api-authentication.md",
            "reasoning": "overlap",
            "contentOverlap": 82
        }))
        .unwrap();
        assert_eq!(s.action, StrategyAction::Update);
        assert_eq!(s.target(), Some("api-authentication.md"));
        assert!(serde_json::from_value::<ContentStrategy>(json!({
            "action": "MERGE", "reasoning": "r", "contentOverlap": 1
        }))
        .is_err());
    }

    #[test]
    fn test_blank_target_counts_as_absent() {
        let s: ContentStrategy = serde_json::from_value(json!({
            "action": "CREATE", "targetFile": "  ", "reasoning": "r", "contentOverlap": 0
        }))
        .unwrap();
        assert_eq!(s.target(), None);
    }

    #[test]
    fn test_overlap_range() {
        let s: ContentStrategy = serde_json::from_value(json!({
            "action": "CREATE", "reasoning": "r", "contentOverlap": 140
        }))
        .unwrap();
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_artifact_defaults() {
        let a: ContentArtifact = serde_json::from_value(json!({
            "content": "# T", "title": "T", "filename": "t.md"
        }))
        .unwrap();
        assert!(a.front_matter.is_empty());
        assert_eq!(a.metadata.word_count, 0);
        assert!(a.validate().is_ok());
    }
}
