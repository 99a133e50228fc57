//! Input adapters - turn user-supplied sources into [`ProcessedContent`]
//!
//! The pipeline never sees the originating format. Adapters are registered
//! explicitly per [`InputType`]; types with no registered adapter resolve
//! to [`AdapterError::Unsupported`].

mod github;
mod text;
mod url;

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use github::GitHubPrAdapter;
pub use text::TextFileAdapter;
pub use url::UrlAdapter;

use crate::request::ProcessedContent;

/// Largest input any built-in adapter accepts
pub const MAX_INPUT_BYTES: u64 = 1_000_000;

static GITHUB_PR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.)?github\.com/([^/\s]+)/([^/\s]+)/pull/(\d+)").expect("valid GitHub PR regex")
});

/// Kind of input source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputType {
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "url")]
    Url,
    #[serde(rename = "github-pr")]
    GitHubPr,
    #[serde(rename = "word")]
    Word,
    #[serde(rename = "pdf")]
    Pdf,
    #[serde(rename = "powerpoint")]
    PowerPoint,
}

impl InputType {
    /// Classify a descriptor (path or URL)
    pub fn detect(descriptor: &str) -> Self {
        let d = descriptor.trim();
        if GITHUB_PR_RE.is_match(d) {
            return InputType::GitHubPr;
        }
        if d.starts_with("http://") || d.starts_with("https://") {
            return InputType::Url;
        }

        let ext = std::path::Path::new(d)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("docx") | Some("doc") => InputType::Word,
            Some("pdf") => InputType::Pdf,
            Some("pptx") | Some("ppt") => InputType::PowerPoint,
            _ => InputType::Text,
        }
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InputType::Text => "text",
            InputType::Url => "url",
            InputType::GitHubPr => "github-pr",
            InputType::Word => "word",
            InputType::Pdf => "pdf",
            InputType::PowerPoint => "powerpoint",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("No adapter for {input_type} input: {descriptor}")]
    Unsupported { input_type: InputType, descriptor: String },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{descriptor} is too large ({bytes} bytes, limit {limit})")]
    TooLarge { descriptor: String, bytes: u64, limit: u64 },

    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Invalid input descriptor: {0}")]
    InvalidDescriptor(String),
}

/// Extracts text from one kind of input
#[async_trait]
pub trait InputAdapter: Send + Sync {
    fn input_type(&self) -> InputType;

    async fn process(&self, descriptor: &str) -> Result<ProcessedContent, AdapterError>;
}

/// Capability-keyed adapter registry, built once at startup
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<InputType, Arc<dyn InputAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the text, URL and GitHub pull-request adapters
    pub fn with_builtins() -> Self {
        debug!("AdapterRegistry::with_builtins: called");
        let mut registry = Self::new();
        registry.register(Arc::new(TextFileAdapter::new()));
        registry.register(Arc::new(UrlAdapter::new()));
        registry.register(Arc::new(GitHubPrAdapter::new()));
        registry
    }

    /// Register an adapter, replacing any previous one for the same type
    pub fn register(&mut self, adapter: Arc<dyn InputAdapter>) {
        debug!(input_type = %adapter.input_type(), "AdapterRegistry::register: called");
        self.adapters.insert(adapter.input_type(), adapter);
    }

    pub fn supports(&self, input_type: InputType) -> bool {
        self.adapters.contains_key(&input_type)
    }

    /// Detect the descriptor's type and run the matching adapter
    pub async fn process(&self, descriptor: &str) -> Result<ProcessedContent, AdapterError> {
        let input_type = InputType::detect(descriptor);
        debug!(%descriptor, %input_type, "AdapterRegistry::process: called");
        let adapter = self
            .adapters
            .get(&input_type)
            .ok_or_else(|| AdapterError::Unsupported {
                input_type,
                descriptor: descriptor.to_string(),
            })?;
        adapter.process(descriptor).await
    }

    /// Process descriptors concurrently, keeping input order
    ///
    /// Fails with the first error encountered.
    pub async fn process_all<I, S>(&self, descriptors: I) -> Result<Vec<ProcessedContent>, AdapterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let descriptors: Vec<String> = descriptors.into_iter().map(|d| d.as_ref().to_string()).collect();
        debug!(count = descriptors.len(), "AdapterRegistry::process_all: called");
        futures::future::try_join_all(descriptors.iter().map(|d| self.process(d))).await
    }
}
