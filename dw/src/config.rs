//! docweaver configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::llm::LlmError;

/// Main docweaver configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default log level (overridden by --log-level)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Pipeline limits and timeouts
    pub pipeline: PipelineConfig,

    /// Repository analyzer settings
    pub analyzer: AnalyzerConfig,

    /// Pattern catalog source
    pub patterns: PatternsConfig,

    /// Prompt template overrides
    pub prompts: PromptsConfig,
}

impl Config {
    /// Validate configuration before a live run
    ///
    /// Checks that the API key environment variable is set so a run fails
    /// before any step instead of at the first oracle call.
    pub fn validate(&self) -> Result<()> {
        if std::env::var(&self.llm.api_key_env).is_err() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Project-local config: .docweaver.yml
        let local_config = PathBuf::from(".docweaver.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // User config: ~/.config/docweaver/docweaver.yml
        if let Some(user_config) = Self::user_config_path()
            && user_config.exists()
        {
            match Self::load_from_file(&user_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialised
    ///
    /// Errors are swallowed: a broken config file is reported properly by
    /// [`Config::load`] once logging is up.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates: Vec<PathBuf> = match config_path {
            Some(p) => vec![p.clone()],
            None => std::iter::once(PathBuf::from(".docweaver.yml"))
                .chain(Self::user_config_path())
                .collect(),
        };

        candidates
            .iter()
            .filter(|p| p.exists())
            .find_map(|p| fs::read_to_string(p).ok())
            .and_then(|content| serde_yaml::from_str::<Config>(&content).ok())
            .and_then(|c| c.log_level)
    }

    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("docweaver").join("docweaver.yml"))
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("anthropic" or "openai")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// HTTP request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String, LlmError> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey(self.api_key_env.clone()))
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 8192,
            timeout_ms: 300_000,
        }
    }
}

/// Pipeline limits and timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Timeout for a single oracle call in milliseconds
    #[serde(rename = "step-timeout-ms")]
    pub step_timeout_ms: u64,

    /// Attempts per step with the same prompt (1 = no retry)
    #[serde(rename = "max-step-attempts")]
    pub max_step_attempts: u32,

    /// Maximum existing documents read before the strategy decision
    #[serde(rename = "existing-doc-limit")]
    pub existing_doc_limit: usize,

    /// Characters kept from each existing document
    #[serde(rename = "existing-doc-preview-chars")]
    pub existing_doc_preview_chars: usize,

    /// Characters kept from each input material in the request
    #[serde(rename = "material-preview-chars")]
    pub material_preview_chars: usize,
}

impl PipelineConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            step_timeout_ms: 120_000,
            max_step_attempts: 1,
            existing_doc_limit: 5,
            existing_doc_preview_chars: 1000,
            material_preview_chars: 500,
        }
    }
}

/// Repository analyzer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Maximum directory depth walked below the root
    #[serde(rename = "max-depth")]
    pub max_depth: usize,

    /// Directory names never descended into
    #[serde(rename = "skip-dirs")]
    pub skip_dirs: Vec<String>,

    /// Name fragments marking a directory as documentation
    #[serde(rename = "doc-keywords")]
    pub doc_keywords: Vec<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            skip_dirs: [
                ".git",
                ".hg",
                ".svn",
                "node_modules",
                "target",
                "dist",
                "build",
                "out",
                ".next",
                "coverage",
                "vendor",
                "__pycache__",
                ".venv",
                "venv",
                ".tox",
                ".idea",
                ".vscode",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            doc_keywords: [
                "docs",
                "doc",
                "documentation",
                "guide",
                "guides",
                "tutorial",
                "tutorials",
                "manual",
                "wiki",
                "help",
                "reference",
                "handbook",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Pattern catalog source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternsConfig {
    /// YAML catalog file; the built-in set is used when absent or unreadable
    pub path: Option<PathBuf>,
}

/// Prompt template overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Directory searched for `{name}.pmt` before the embedded templates
    pub dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.pipeline.existing_doc_limit, 5);
        assert_eq!(config.pipeline.max_step_attempts, 1);
        assert_eq!(config.analyzer.max_depth, 3);
        assert!(config.patterns.path.is_none());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
log-level: debug
llm:
  provider: openai
  model: gpt-4o
  api-key-env: MY_API_KEY
  base-url: https://api.example.com
  max-tokens: 4096
  timeout-ms: 60000

pipeline:
  step-timeout-ms: 30000
  max-step-attempts: 3

analyzer:
  max-depth: 5
  doc-keywords: [docs, handbook]

patterns:
  path: patterns.yml
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.api_key_env, "MY_API_KEY");
        assert_eq!(config.pipeline.step_timeout(), Duration::from_secs(30));
        assert_eq!(config.pipeline.max_step_attempts, 3);
        assert_eq!(config.pipeline.existing_doc_limit, 5);
        assert_eq!(config.analyzer.max_depth, 5);
        assert_eq!(config.analyzer.doc_keywords, vec!["docs", "handbook"]);
        assert!(!config.analyzer.skip_dirs.is_empty());
        assert_eq!(config.patterns.path, Some(PathBuf::from("patterns.yml")));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
llm:
  model: claude-haiku
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.model, "claude-haiku");
        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.pipeline.material_preview_chars, 500);
    }

    #[test]
    fn test_load_explicit_path() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("dw.yml");
        fs::write(&path, "log-level: trace\npipeline:\n  existing-doc-limit: 2\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.pipeline.existing_doc_limit, 2);
        assert_eq!(Config::load_log_level(Some(&path)).as_deref(), Some("trace"));
    }

    #[test]
    fn test_load_explicit_missing_path_fails() {
        let path = PathBuf::from("/nonexistent/docweaver.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    #[serial]
    fn test_get_api_key_from_env() {
        let config = LlmConfig {
            api_key_env: "DW_TEST_API_KEY".to_string(),
            ..Default::default()
        };

        unsafe { std::env::remove_var("DW_TEST_API_KEY") };
        assert!(matches!(config.get_api_key(), Err(LlmError::MissingApiKey(_))));

        unsafe { std::env::set_var("DW_TEST_API_KEY", "sk-test") };
        assert_eq!(config.get_api_key().unwrap(), "sk-test");
        unsafe { std::env::remove_var("DW_TEST_API_KEY") };
    }
}
