//! docweaver - documentation pipeline CLI
//!
//! Entry point for running the pipeline, inspecting a repository and
//! listing documentation patterns.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use docweaver::cli::{Cli, Command, OutputFormat, get_log_path};
use docweaver::config::Config;
use docweaver::llm::create_client;
use docweaver::oracle::{LlmOracle, ReasoningOracle, ScriptedOracle};
use docweaver::pipeline::{Orchestrator, ProgressSink, RunOutcome, RunReport, Stage};
use docweaver::prompts::PromptLoader;
use docweaver::request::ContentRequest;
use docweaver::step::StepExecutor;
use docweaver::workspace::{LocalWorkspace, Workspace};
use docweaver::{AdapterRegistry, PatternCatalog, RepositoryAnalyzer};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    // Setup logging with priority: CLI > config > INFO default
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!("docweaver loaded config: provider={} model={}", config.llm.provider, config.llm.model);

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Generate {
            goal,
            audience,
            content_type,
            inputs,
            root,
            simulate,
            format,
        } => {
            let args = GenerateArgs {
                goal,
                audience,
                content_type,
                inputs,
                root,
                simulate,
            };
            let report = cmd_generate(&config, args).await?;
            print_report(&report, format)?;
            if report.is_failed() {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Analyze { root } => cmd_analyze(&config, &root),
        Command::Patterns { format } => cmd_patterns(&config, format),
    }
}

struct GenerateArgs {
    goal: String,
    audience: Option<String>,
    content_type: Option<String>,
    inputs: Vec<String>,
    root: PathBuf,
    simulate: Option<PathBuf>,
}

/// Prints each stage transition to stderr as it happens
struct StderrProgress;

impl ProgressSink for StderrProgress {
    fn on_progress(&self, stage: Stage, message: &str) {
        let label = format!("[{}]", stage);
        let label = match stage {
            Stage::Done => label.green(),
            Stage::Failed => label.red(),
            Stage::Cancelled => label.yellow(),
            _ => label.cyan(),
        };
        eprintln!("{} {}", label, message);
    }
}

async fn cmd_generate(config: &Config, args: GenerateArgs) -> Result<RunReport> {
    debug!(goal = %args.goal, inputs = args.inputs.len(), root = %args.root.display(), "cmd_generate: called");

    let oracle: Arc<dyn ReasoningOracle> = match &args.simulate {
        Some(path) => {
            let script = fs::read_to_string(path).context(format!("Failed to read simulation script {}", path.display()))?;
            let oracle = ScriptedOracle::from_yaml(&script)
                .context(format!("Simulation script {} must be a YAML list of strings", path.display()))?;
            info!(responses = oracle.remaining(), "Using scripted oracle");
            Arc::new(oracle)
        }
        None => {
            config.validate()?;
            let client = create_client(&config.llm).context("Failed to create LLM client")?;
            Arc::new(LlmOracle::new(client, config.llm.max_tokens))
        }
    };

    let workspace = LocalWorkspace::new(&args.root).context(format!("Invalid workspace root {}", args.root.display()))?;
    let store = PromptLoader::new(workspace.root(), config.prompts.dir.as_deref());
    let executor = StepExecutor::new(store, oracle, config.pipeline.step_timeout());
    let catalog = Arc::new(PatternCatalog::load(config.patterns.path.as_deref()));
    let analyzer = RepositoryAnalyzer::new(config.analyzer.clone());

    let registry = AdapterRegistry::with_builtins();
    let materials = registry
        .process_all(&args.inputs)
        .await
        .context("Failed to read input materials")?;

    let mut request = ContentRequest::builder(args.goal).materials(materials);
    if let Some(audience) = args.audience {
        request = request.audience(audience);
    }
    if let Some(content_type) = args.content_type {
        request = request.content_type(content_type);
    }

    let orchestrator = Orchestrator::new(executor, Arc::new(workspace), catalog, analyzer, config.pipeline.clone())
        .with_progress(Arc::new(StderrProgress));

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            on_signal.cancel();
        }
    });

    Ok(orchestrator.run(request, &cancel).await)
}

fn print_report(report: &RunReport, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(report).context("Failed to serialize run report")?);
        return Ok(());
    }

    match &report.outcome {
        RunOutcome::Completed { action, artifact_path } => {
            println!("{} {}", "Completed".green().bold(), format!("({})", action).dimmed());
            println!("Artifact: {}", artifact_path.display());
        }
        RunOutcome::Failed { stage, error, .. } => {
            println!("{} at {}", "Failed".red().bold(), stage);
            println!("Error: {}", error);
        }
        RunOutcome::Cancelled { stage } => {
            println!("{} during {}", "Cancelled".yellow().bold(), stage);
        }
    }

    println!("Steps:");
    for (stage, record) in &report.steps {
        if record.success {
            println!("  {} {}", "ok".green(), stage);
        } else {
            println!(
                "  {} {}: {}",
                "failed".red(),
                stage,
                record.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    println!("Run: {}", report.run_id);
    Ok(())
}

fn cmd_analyze(config: &Config, root: &Path) -> Result<()> {
    debug!(root = %root.display(), "cmd_analyze: called");
    let analysis = RepositoryAnalyzer::new(config.analyzer.clone())
        .analyze(root)
        .context(format!("Failed to analyze {}", root.display()))?;
    println!("{}", serde_json::to_string_pretty(&analysis)?);
    Ok(())
}

fn cmd_patterns(config: &Config, format: OutputFormat) -> Result<()> {
    debug!(?format, "cmd_patterns: called");
    let catalog = PatternCatalog::load(config.patterns.path.as_deref());

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(catalog.available_patterns())?);
        }
        OutputFormat::Text => {
            for pattern in catalog.available_patterns() {
                println!("{} {}", pattern.id.bold(), format!("- {}", pattern.name).dimmed());
                if !pattern.description.is_empty() {
                    println!("  {}", pattern.description);
                }
                let sections: Vec<String> = pattern
                    .sections
                    .iter()
                    .map(|s| if s.terminal { format!("{} (last)", s.name) } else { s.name.clone() })
                    .collect();
                println!("  Sections: {}", sections.join(", "));
            }
        }
    }
    Ok(())
}
