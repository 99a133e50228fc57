//! Step execution: prompt in, validated typed decision out
//!
//! A step renders a template, asks the oracle once, pulls JSON out of the
//! answer and checks it against the output type's contract. Failures are
//! values ([`StepResult`] with `success: false`), never panics or errors,
//! so the orchestrator decides what is fatal.

mod executor;
pub mod extract;
pub mod schema;

use serde::Serialize;
use serde_json::Value;

pub use executor::StepExecutor;
pub use extract::{ExtractionStrategy, extract_json};
pub use schema::{
    AlternativeDirectory, AlternativePattern, ArtifactMetadata, ArtifactSection, ContentArtifact, ContentStrategy,
    DirectorySelection, PatternSelection, StepOutput, StrategyAction,
};

/// Outcome of one step, kept for diagnostics whether or not it succeeded
#[derive(Debug, Clone, Serialize)]
pub struct StepResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Rendered prompt sent to the oracle
    pub prompt: String,
    /// Raw oracle text (empty if the call itself failed)
    pub response: String,
}

impl<T> StepResult<T> {
    pub fn ok(data: T, prompt: String, response: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            prompt,
            response,
        }
    }

    pub fn failed(error: impl Into<String>, prompt: String, response: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            prompt,
            response,
        }
    }
}

impl<T: Serialize> StepResult<T> {
    /// Type-erased copy for the run's step map
    pub fn record(&self) -> StepRecord {
        StepRecord {
            success: self.success,
            data: self.data.as_ref().and_then(|d| serde_json::to_value(d).ok()),
            error: self.error.clone(),
            prompt: self.prompt.clone(),
            response: self.response.clone(),
        }
    }
}

/// [`StepResult`] with its payload erased to JSON
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub prompt: String,
    pub response: String,
}

impl StepRecord {
    /// Record for a local (non-oracle) stage
    pub fn local(success: bool, data: Option<Value>, error: Option<String>) -> Self {
        Self {
            success,
            data,
            error,
            prompt: String::new(),
            response: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_keeps_prompt_and_response() {
        let result = StepResult::ok(serde_json::json!({"a": 1}), "p".to_string(), "r".to_string());
        let record = result.record();
        assert!(record.success);
        assert_eq!(record.data, Some(serde_json::json!({"a": 1})));
        assert_eq!(record.prompt, "p");
        assert_eq!(record.response, "r");
    }

    #[test]
    fn test_failed_result_serializes_without_data() {
        let result: StepResult<String> = StepResult::failed("timeout", "p".to_string(), String::new());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "timeout");
        assert!(json.get("data").is_none());
    }
}
