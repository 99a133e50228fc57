//! CLI command definitions

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::debug;

/// docweaver - LLM-guided documentation writer
#[derive(Parser)]
#[command(
    name = "dw",
    about = "Decide where documentation belongs, then create or update it",
    version = env!("CARGO_PKG_VERSION"),
    after_help = after_help(),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the documentation pipeline
    Generate {
        /// What the document should achieve
        #[arg(short, long, value_parser = non_blank)]
        goal: String,

        /// Who the document is for
        #[arg(short, long)]
        audience: Option<String>,

        /// Kind of content (guide, reference, tutorial, ...)
        #[arg(short = 't', long)]
        content_type: Option<String>,

        /// Source material: file path, URL or GitHub pull request URL (repeatable)
        #[arg(short, long = "input", value_name = "SRC")]
        inputs: Vec<String>,

        /// Workspace root
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// Replay oracle responses from a YAML list instead of calling an LLM
        #[arg(long, value_name = "FILE")]
        simulate: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print the repository analysis as JSON
    Analyze {
        /// Workspace root
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
    },

    /// List the documentation patterns
    Patterns {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

/// Output format for reports and listings
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Path of the log file
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("docweaver")
        .join("logs")
        .join("docweaver.log")
}

fn non_blank(value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("must not be blank".to_string());
    }
    Ok(trimmed.to_string())
}

fn after_help() -> String {
    format!("Logs are written to: {}", get_log_path().display())
}
