//! Shared HTTP retry loop for provider clients

use std::time::Duration;

use reqwest::{RequestBuilder, Response};
use tracing::{debug, warn};

use super::LlmError;

/// Maximum number of retries for transient errors
pub(crate) const MAX_RETRIES: u32 = 3;

/// Initial backoff delay for retries
pub(crate) const INITIAL_BACKOFF_MS: u64 = 1000;

/// Check if an HTTP status code is retryable
pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 500 | 502 | 503 | 504 | 529)
}

/// Send a request, retrying network failures and transient statuses with
/// exponential backoff. A 429 is returned immediately as `RateLimited`.
///
/// `build` is called once per attempt since a `RequestBuilder` is consumed by `send`.
pub(crate) async fn send_with_retry<F>(label: &str, build: F) -> Result<Response, LlmError>
where
    F: Fn() -> RequestBuilder,
{
    debug!(%label, "send_with_retry: called");
    let mut last_error = None;
    for attempt in 0..=MAX_RETRIES {
        if attempt > 0 {
            let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1);
            warn!(%label, attempt, backoff_ms = backoff, "send_with_retry: retrying after transient error");
            tokio::time::sleep(Duration::from_millis(backoff)).await;
        }

        let response = match build().send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(%label, attempt, error = %e, "send_with_retry: network error");
                last_error = Some(LlmError::Network(e));
                continue;
            }
        };

        let status = response.status().as_u16();

        if status == 429 {
            debug!(%label, "send_with_retry: rate limited (429)");
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);

            return Err(LlmError::RateLimited {
                retry_after: Duration::from_secs(retry_after),
            });
        }

        if is_retryable_status(status) && attempt < MAX_RETRIES {
            let text = response.text().await.unwrap_or_default();
            debug!(%label, attempt, status, "send_with_retry: retryable status");
            last_error = Some(LlmError::ApiError { status, message: text });
            continue;
        }

        if !response.status().is_success() {
            debug!(%label, %status, "send_with_retry: API error");
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError { status, message: text });
        }

        return Ok(response);
    }

    Err(last_error.unwrap_or_else(|| LlmError::InvalidResponse("Max retries exceeded".to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(503));
        assert!(is_retryable_status(529));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(401));
        // 429 is surfaced as RateLimited rather than retried blindly
        assert!(!is_retryable_status(429));
    }
}
