//! Content requests - what the user wants and what they brought

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::adapters::InputType;

pub const DEFAULT_AUDIENCE: &str = "developers";
pub const DEFAULT_CONTENT_TYPE: &str = "guide";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("goal must not be blank")]
    BlankGoal,
}

/// Normalized output of an input adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedContent {
    pub source: String,
    #[serde(rename = "type")]
    pub input_type: InputType,
    pub text: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl ProcessedContent {
    pub fn new(source: impl Into<String>, input_type: InputType, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            input_type,
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Preview of one input material carried in the request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputMaterial {
    pub source: String,
    #[serde(rename = "type")]
    pub input_type: InputType,
    pub preview: String,
}

/// Immutable request for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRequest {
    pub goal: String,
    pub audience: String,
    pub content_type: String,
    pub input_materials: Vec<InputMaterial>,
    pub timestamp: DateTime<Utc>,
}

impl ContentRequest {
    pub fn builder(goal: impl Into<String>) -> ContentRequestBuilder {
        ContentRequestBuilder::new(goal)
    }

    /// Material previews as prompt text
    pub fn materials_text(&self) -> String {
        if self.input_materials.is_empty() {
            return "(no input materials provided)".to_string();
        }
        self.input_materials
            .iter()
            .map(|m| format!("### {} ({})\n{}", m.source, m.input_type, m.preview))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Variables shared by every step prompt
    pub fn prompt_variables(&self) -> HashMap<String, String> {
        HashMap::from([
            ("goal".to_string(), self.goal.clone()),
            ("audience".to_string(), self.audience.clone()),
            ("content_type".to_string(), self.content_type.clone()),
            ("materials".to_string(), self.materials_text()),
        ])
    }
}

/// Builder for [`ContentRequest`]
#[derive(Debug, Clone)]
pub struct ContentRequestBuilder {
    goal: String,
    audience: Option<String>,
    content_type: Option<String>,
    materials: Vec<ProcessedContent>,
    preview_chars: usize,
}

impl ContentRequestBuilder {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            audience: None,
            content_type: None,
            materials: Vec::new(),
            preview_chars: 500,
        }
    }

    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn material(mut self, content: ProcessedContent) -> Self {
        self.materials.push(content);
        self
    }

    pub fn materials(mut self, contents: impl IntoIterator<Item = ProcessedContent>) -> Self {
        self.materials.extend(contents);
        self
    }

    pub fn preview_chars(mut self, chars: usize) -> Self {
        self.preview_chars = chars;
        self
    }

    /// Fails only when the goal is empty or whitespace
    pub fn build(self) -> Result<ContentRequest, RequestError> {
        debug!(materials = self.materials.len(), preview_chars = self.preview_chars, "ContentRequestBuilder::build: called");
        let goal = self.goal.trim().to_string();
        if goal.is_empty() {
            return Err(RequestError::BlankGoal);
        }
        let non_blank = |v: Option<String>, default: &str| {
            v.map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let input_materials = self
            .materials
            .into_iter()
            .map(|m| InputMaterial {
                preview: truncate_chars(m.text.trim(), self.preview_chars),
                source: m.source,
                input_type: m.input_type,
            })
            .collect();

        Ok(ContentRequest {
            goal,
            audience: non_blank(self.audience, DEFAULT_AUDIENCE),
            content_type: non_blank(self.content_type, DEFAULT_CONTENT_TYPE),
            input_materials,
            timestamp: Utc::now(),
        })
    }
}

/// Keep at most `max` characters, marking the cut with an ellipsis
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
