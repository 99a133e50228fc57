//! LLM error types

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by LLM clients and reasoning oracles
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("API key not found in environment variable {0}")]
    MissingApiKey(String),

    #[error("Unknown LLM provider '{0}'. Supported: anthropic, openai")]
    UnknownProvider(String),

    #[error("timeout")]
    Timeout(Duration),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// Check if this error is worth another attempt with the same request
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited { .. } => true,
            LlmError::ApiError { status, .. } => *status >= 500,
            LlmError::Network(_) => true,
            LlmError::Timeout(_) => true,
            LlmError::InvalidResponse(_)
            | LlmError::MissingApiKey(_)
            | LlmError::UnknownProvider(_)
            | LlmError::Json(_) => false,
        }
    }

    /// Get the retry duration if this is a rate limit error
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            LlmError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        assert!(
            LlmError::RateLimited {
                retry_after: Duration::from_secs(60)
            }
            .is_retryable()
        );
        assert!(
            LlmError::ApiError {
                status: 503,
                message: "overloaded".to_string()
            }
            .is_retryable()
        );
        assert!(
            !LlmError::ApiError {
                status: 401,
                message: "bad key".to_string()
            }
            .is_retryable()
        );
        assert!(LlmError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(!LlmError::MissingApiKey("ANTHROPIC_API_KEY".to_string()).is_retryable());
    }

    #[test]
    fn test_timeout_displays_as_timeout() {
        // The step executor reports this text verbatim as the step error
        assert_eq!(LlmError::Timeout(Duration::from_secs(5)).to_string(), "timeout");
    }

    #[test]
    fn test_retry_after() {
        let err = LlmError::RateLimited {
            retry_after: Duration::from_secs(42),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(42)));
        assert_eq!(LlmError::InvalidResponse("x".to_string()).retry_after(), None);
    }
}
