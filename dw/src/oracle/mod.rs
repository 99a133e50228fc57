//! Reasoning oracle - the only thing a pipeline step talks to
//!
//! An oracle takes a fully rendered prompt and returns raw text. It knows
//! nothing about schemas or steps. The live implementation wraps an
//! [`LlmClient`]; the scripted one replays canned answers for tests and
//! `--simulate` runs.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::llm::{CompletionRequest, LlmClient, LlmError};

/// System prompt framing every step exchange
const SYSTEM_PROMPT: &str = "You are a technical documentation strategist embedded in a documentation tool. \
Every request asks for a single decision or document. Answer with exactly one JSON object that \
matches the requested shape, optionally inside a ```json fenced block. Do not add commentary.";

/// External, non-deterministic text service consulted at each step
///
/// Implementations must be reentrant: concurrent pipeline runs share one instance.
/// Transport and auth failures are errors; an empty answer is never returned as `Ok`.
#[async_trait]
pub trait ReasoningOracle: Send + Sync {
    async fn send(&self, prompt: &str, timeout: Duration) -> Result<String, LlmError>;
}

/// Live oracle backed by an LLM provider client
pub struct LlmOracle {
    client: Arc<dyn LlmClient>,
    max_tokens: u32,
}

impl LlmOracle {
    pub fn new(client: Arc<dyn LlmClient>, max_tokens: u32) -> Self {
        debug!(model = %client.model(), max_tokens, "LlmOracle::new: called");
        Self { client, max_tokens }
    }
}

#[async_trait]
impl ReasoningOracle for LlmOracle {
    async fn send(&self, prompt: &str, timeout: Duration) -> Result<String, LlmError> {
        debug!(prompt_len = prompt.len(), ?timeout, "LlmOracle::send: called");
        let request = CompletionRequest::single(SYSTEM_PROMPT, prompt, self.max_tokens);

        let response = tokio::time::timeout(timeout, self.client.complete(request))
            .await
            .map_err(|_| LlmError::Timeout(timeout))??;

        match response.content {
            Some(text) if !text.trim().is_empty() => {
                debug!(response_len = text.len(), stop_reason = ?response.stop_reason, "LlmOracle::send: got text");
                Ok(text)
            }
            _ => Err(LlmError::InvalidResponse(format!(
                "model returned no text (stop reason {:?})",
                response.stop_reason
            ))),
        }
    }
}

/// Simulated oracle that replays a fixed list of responses in order
///
/// Records every prompt it receives so tests can assert on rendered context.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    responses: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedOracle {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let responses: VecDeque<String> = responses.into_iter().map(Into::into).collect();
        debug!(count = responses.len(), "ScriptedOracle::new: called");
        Self {
            responses: Mutex::new(responses),
            prompts: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Sleep before answering, to exercise timeouts and cancellation
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Load responses from a YAML list of strings
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        let responses: Vec<String> = serde_yaml::from_str(yaml)?;
        Ok(Self::new(responses))
    }

    /// Prompts received so far, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Responses not yet consumed
    pub fn remaining(&self) -> usize {
        self.responses.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ReasoningOracle for ScriptedOracle {
    async fn send(&self, prompt: &str, timeout: Duration) -> Result<String, LlmError> {
        debug!(prompt_len = prompt.len(), "ScriptedOracle::send: called");
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        if let Some(delay) = self.delay {
            if delay >= timeout {
                tokio::time::sleep(timeout).await;
                return Err(LlmError::Timeout(timeout));
            }
            tokio::time::sleep(delay).await;
        }

        let next = self
            .responses
            .lock()
            .map_err(|_| LlmError::InvalidResponse("scripted oracle poisoned".to_string()))?
            .pop_front();

        match next {
            Some(text) if !text.trim().is_empty() => Ok(text),
            Some(_) => Err(LlmError::InvalidResponse("scripted response is empty".to_string())),
            None => Err(LlmError::InvalidResponse("scripted oracle has no more responses".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::MockLlmClient;

    #[tokio::test]
    async fn test_llm_oracle_returns_text() {
        let client = Arc::new(MockLlmClient::new(vec![Some("{\"x\": 1}".to_string())]));
        let oracle = LlmOracle::new(client.clone(), 2048);

        let text = oracle.send("pick one", Duration::from_secs(5)).await.unwrap();
        assert_eq!(text, "{\"x\": 1}");

        let request = client.last_request().unwrap();
        assert_eq!(request.messages[0].content, "pick one");
        assert!(request.system_prompt.contains("JSON"));
        assert_eq!(request.max_tokens, 2048);
    }

    #[tokio::test]
    async fn test_llm_oracle_rejects_empty_text() {
        let client = Arc::new(MockLlmClient::new(vec![None, Some("   ".to_string())]));
        let oracle = LlmOracle::new(client, 100);

        assert!(matches!(
            oracle.send("p", Duration::from_secs(5)).await,
            Err(LlmError::InvalidResponse(_))
        ));
        assert!(matches!(
            oracle.send("p", Duration::from_secs(5)).await,
            Err(LlmError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_scripted_oracle_replays_and_records() {
        let oracle = ScriptedOracle::new(["first", "second"]);

        assert_eq!(oracle.send("a", Duration::from_secs(1)).await.unwrap(), "first");
        assert_eq!(oracle.send("b", Duration::from_secs(1)).await.unwrap(), "second");
        assert!(oracle.send("c", Duration::from_secs(1)).await.is_err());
        assert_eq!(oracle.prompts(), vec!["a", "b", "c"]);
        assert_eq!(oracle.remaining(), 0);
    }

    #[tokio::test]
    async fn test_scripted_oracle_times_out() {
        let oracle = ScriptedOracle::new(["late"]).with_delay(Duration::from_millis(200));
        let result = oracle.send("p", Duration::from_millis(20)).await;
        assert!(matches!(result, Err(LlmError::Timeout(_))));
    }

    #[test]
    fn test_scripted_oracle_from_yaml() {
        let yaml = "- '{\"a\": 1}'\n- |\n  ```json\n  {\"b\": 2}\n  ```\n";
        let oracle = ScriptedOracle::from_yaml(yaml).unwrap();
        assert_eq!(oracle.remaining(), 2);
    }
}
