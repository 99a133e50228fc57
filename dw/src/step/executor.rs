//! StepExecutor - one oracle call per step

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::extract::extract_json;
use super::schema::{StepOutput, check_required};
use super::StepResult;
use crate::llm::LlmError;
use crate::oracle::ReasoningOracle;
use crate::prompts::{PromptError, PromptRenderer, TemplateStore};

/// Renders step prompts, consults the oracle and validates the answer
pub struct StepExecutor<S> {
    renderer: PromptRenderer<S>,
    oracle: Arc<dyn ReasoningOracle>,
    timeout: Duration,
}

impl<S: TemplateStore> StepExecutor<S> {
    pub fn new(store: S, oracle: Arc<dyn ReasoningOracle>, timeout: Duration) -> Self {
        debug!(?timeout, "StepExecutor::new: called");
        Self {
            renderer: PromptRenderer::new(store),
            oracle,
            timeout,
        }
    }

    /// Render `template_id` with `variables` and run it once
    ///
    /// Only an unknown or unrenderable template is an `Err`; everything that
    /// goes wrong after the prompt exists is a failed [`StepResult`].
    pub async fn execute<T: StepOutput>(
        &self,
        template_id: &str,
        variables: &HashMap<String, String>,
    ) -> Result<StepResult<T>, PromptError> {
        self.execute_with_retry(template_id, variables, 1).await
    }

    /// Like [`execute`](Self::execute), re-sending the same prompt up to
    /// `attempts` times while the result is a failure
    pub async fn execute_with_retry<T: StepOutput>(
        &self,
        template_id: &str,
        variables: &HashMap<String, String>,
        attempts: u32,
    ) -> Result<StepResult<T>, PromptError> {
        debug!(%template_id, attempts, "StepExecutor::execute_with_retry: called");
        let (prompt, _unresolved) = self.renderer.render(template_id, variables)?;

        let attempts = attempts.max(1);
        let mut result = self.run_prompt::<T>(prompt.clone()).await;
        for attempt in 2..=attempts {
            if result.success {
                break;
            }
            warn!(
                %template_id,
                attempt,
                error = result.error.as_deref().unwrap_or_default(),
                "Step failed, retrying with the same prompt"
            );
            result = self.run_prompt::<T>(prompt.clone()).await;
        }
        Ok(result)
    }

    /// Send an already rendered prompt and validate the answer as `T`
    pub async fn run_prompt<T: StepOutput>(&self, prompt: String) -> StepResult<T> {
        debug!(prompt_len = prompt.len(), "StepExecutor::run_prompt: called");
        let sent = tokio::time::timeout(self.timeout, self.oracle.send(&prompt, self.timeout)).await;

        let response = match sent {
            Ok(Ok(text)) => text,
            Ok(Err(LlmError::Timeout(_))) | Err(_) => {
                debug!("StepExecutor::run_prompt: oracle timed out");
                return StepResult::failed("timeout", prompt, String::new());
            }
            Ok(Err(e)) => {
                debug!(error = %e, "StepExecutor::run_prompt: oracle error");
                return StepResult::failed(format!("oracle error: {}", e), prompt, String::new());
            }
        };
        debug!(response_len = response.len(), "StepExecutor::run_prompt: got response");

        match parse_output::<T>(&response) {
            Ok(data) => StepResult::ok(data, prompt, response),
            Err(error) => {
                debug!(%error, "StepExecutor::run_prompt: contract check failed");
                StepResult::failed(error, prompt, response)
            }
        }
    }
}

/// Extract, check required fields, deserialize, then run field-level validation
pub fn parse_output<T: StepOutput>(response: &str) -> Result<T, String> {
    let (value, strategy) =
        extract_json(response).ok_or_else(|| "no parseable JSON found in oracle response".to_string())?;
    debug!(%strategy, "parse_output: extracted JSON");

    check_required(&value, T::REQUIRED_FIELDS)?;
    let data: T = serde_json::from_value(value).map_err(|e| format!("schema mismatch: {}", e))?;
    data.validate()?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::ScriptedOracle;
    use crate::prompts::MemoryTemplates;
    use crate::step::{ContentStrategy, DirectorySelection, StrategyAction};

    fn executor(oracle: Arc<ScriptedOracle>) -> StepExecutor<MemoryTemplates> {
        let store = MemoryTemplates::new([("pick", "Goal: {{goal}}")]);
        StepExecutor::new(store, oracle, Duration::from_secs(2))
    }

    fn vars() -> HashMap<String, String> {
        HashMap::from([("goal".to_string(), "quickstart".to_string())])
    }

    const GOOD_DIR: &str = r#"```json
{"selectedDirectory": "docs", "reasoning": "new", "confidence": 0.8, "directoryPurpose": "guides"}
```"#;

    #[tokio::test]
    async fn test_execute_success() {
        let oracle = Arc::new(ScriptedOracle::new([GOOD_DIR]));
        let result = executor(oracle.clone())
            .execute::<DirectorySelection>("pick", &vars())
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.data.unwrap().selected_directory, "docs");
        assert_eq!(result.prompt, "Goal: quickstart");
        assert_eq!(result.response, GOOD_DIR);
        assert_eq!(oracle.prompts(), vec!["Goal: quickstart"]);
    }

    #[tokio::test]
    async fn test_unknown_template_is_error() {
        let oracle = Arc::new(ScriptedOracle::new([GOOD_DIR]));
        let err = executor(oracle.clone())
            .execute::<DirectorySelection>("missing", &vars())
            .await
            .unwrap_err();

        assert!(matches!(err, PromptError::TemplateNotFound(_)));
        assert!(oracle.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_response_is_failed_result() {
        let oracle = Arc::new(ScriptedOracle::new(["I cannot decide."]));
        let result = executor(oracle)
            .execute::<DirectorySelection>("pick", &vars())
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.error.unwrap().contains("no parseable JSON"));
        assert_eq!(result.response, "I cannot decide.");
    }

    #[tokio::test]
    async fn test_missing_field_is_failed_result() {
        let oracle = Arc::new(ScriptedOracle::new([r#"{"action": "CREATE", "reasoning": "r"}"#]));
        let result = executor(oracle)
            .execute::<ContentStrategy>("pick", &vars())
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.error.unwrap().contains("contentOverlap"));
    }

    #[tokio::test]
    async fn test_invalid_enum_is_failed_result() {
        let oracle = Arc::new(ScriptedOracle::new([
            r#"{"action": "REWRITE", "reasoning": "r", "contentOverlap": 3}"#,
        ]));
        let result = executor(oracle)
            .execute::<ContentStrategy>("pick", &vars())
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("schema mismatch"));
    }

    #[tokio::test]
    async fn test_timeout_is_failed_result() {
        let oracle = Arc::new(ScriptedOracle::new([GOOD_DIR]).with_delay(Duration::from_secs(10)));
        let store = MemoryTemplates::new([("pick", "Goal: {{goal}}")]);
        let exec = StepExecutor::new(store, oracle, Duration::from_millis(30));

        let result = exec.execute::<DirectorySelection>("pick", &vars()).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn test_retry_resends_same_prompt() {
        let oracle = Arc::new(ScriptedOracle::new([
            "garbage",
            r#"{"action": "CREATE", "reasoning": "r", "contentOverlap": 0}"#,
        ]));
        let result = executor(oracle.clone())
            .execute_with_retry::<ContentStrategy>("pick", &vars(), 3)
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.data.unwrap().action, StrategyAction::Create);
        let prompts = oracle.prompts();
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0], prompts[1]);
    }

    #[tokio::test]
    async fn test_no_retry_by_default() {
        let oracle = Arc::new(ScriptedOracle::new(["garbage", GOOD_DIR]));
        let result = executor(oracle.clone())
            .execute::<DirectorySelection>("pick", &vars())
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(oracle.remaining(), 1);
    }
}
