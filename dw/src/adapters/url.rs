//! Web pages and other http(s) resources

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{AdapterError, InputAdapter, InputType, MAX_INPUT_BYTES};
use crate::request::ProcessedContent;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches a URL, converting HTML to markdown and pretty-printing JSON
pub struct UrlAdapter {
    client: reqwest::Client,
}

impl UrlAdapter {
    pub fn new() -> Self {
        debug!("UrlAdapter::new: called");
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(concat!("docweaver/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for UrlAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InputAdapter for UrlAdapter {
    fn input_type(&self) -> InputType {
        InputType::Url
    }

    async fn process(&self, descriptor: &str) -> Result<ProcessedContent, AdapterError> {
        debug!(%descriptor, "UrlAdapter::process: called");
        if !descriptor.starts_with("http://") && !descriptor.starts_with("https://") {
            return Err(AdapterError::InvalidDescriptor(format!(
                "URL must start with http:// or https://: {}",
                descriptor
            )));
        }
        let fetch_err = |message: String| AdapterError::Fetch {
            url: descriptor.to_string(),
            message,
        };

        let response = self
            .client
            .get(descriptor)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        let status = response.status();
        debug!(%status, "UrlAdapter::process: response received");
        if !status.is_success() {
            return Err(fetch_err(format!("HTTP error: {}", status)));
        }

        if let Some(len) = response.content_length()
            && len > MAX_INPUT_BYTES
        {
            return Err(AdapterError::TooLarge {
                descriptor: descriptor.to_string(),
                bytes: len,
                limit: MAX_INPUT_BYTES,
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = response.text().await.map_err(|e| fetch_err(e.to_string()))?;
        if body.len() as u64 > MAX_INPUT_BYTES {
            return Err(AdapterError::TooLarge {
                descriptor: descriptor.to_string(),
                bytes: body.len() as u64,
                limit: MAX_INPUT_BYTES,
            });
        }

        let text = convert_body(&content_type, body);
        debug!(%content_type, text_len = text.len(), "UrlAdapter::process: converted body");

        Ok(ProcessedContent::new(descriptor, InputType::Url, text)
            .with_metadata("content-type", content_type)
            .with_metadata("status", status.as_u16().to_string()))
    }
}

/// Normalize a response body by content type
fn convert_body(content_type: &str, body: String) -> String {
    if content_type.contains("text/html") || content_type.contains("application/xhtml") {
        html2md::rewrite_html(&body, false)
    } else if content_type.contains("application/json") {
        match serde_json::from_str::<Value>(&body) {
            Ok(json) => serde_json::to_string_pretty(&json).unwrap_or(body),
            Err(_) => body,
        }
    } else {
        body
    }
}
