//! docweaver - LLM-guided documentation pipeline
//!
//! docweaver chains a handful of decisions, each delegated to a reasoning
//! oracle and validated against a JSON contract, to turn a goal plus source
//! material into a documentation file in the right place.
//!
//! # Core Concepts
//!
//! - **Decide, then write**: directory, create-vs-update and pattern are
//!   separate validated decisions; only the final stage touches disk
//! - **Contracts over trust**: every oracle answer is extracted, checked for
//!   required fields and validated before the next step sees it
//! - **Swappable oracle**: live LLM providers and scripted replays share
//!   one interface and one pipeline
//!
//! # Modules
//!
//! - [`pipeline`] - Stage machine and orchestrator
//! - [`step`] - Step executor, JSON extraction and step schemas
//! - [`oracle`] - Reasoning oracle trait, live and scripted oracles
//! - [`llm`] - LLM client trait and provider implementations
//! - [`prompts`] - Step prompt templates and rendering
//! - [`patterns`] - Documentation pattern catalog
//! - [`analyzer`] - Repository analysis
//! - [`request`] - Content requests
//! - [`adapters`] - Input adapters (files, URLs, pull requests)
//! - [`workspace`] - Sandboxed filesystem access and artifact writing
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod adapters;
pub mod analyzer;
pub mod cli;
pub mod config;
pub mod llm;
pub mod oracle;
pub mod patterns;
pub mod pipeline;
pub mod prompts;
pub mod request;
pub mod step;
pub mod workspace;

// Re-export commonly used types
pub use adapters::{AdapterError, AdapterRegistry, InputAdapter, InputType};
pub use analyzer::{AnalyzerError, RepositoryAnalysis, RepositoryAnalyzer};
pub use config::{Config, LlmConfig, PipelineConfig};
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, create_client};
pub use oracle::{LlmOracle, ReasoningOracle, ScriptedOracle};
pub use patterns::{Pattern, PatternCatalog, PatternError, PatternSection};
pub use pipeline::{
    ChannelProgress, FailureKind, LogProgress, Orchestrator, PipelineError, ProgressSink, RunOutcome, RunReport, Stage,
};
pub use prompts::{MemoryTemplates, PromptError, PromptLoader, TemplateStore};
pub use request::{ContentRequest, ContentRequestBuilder, ProcessedContent, RequestError};
pub use step::{StepExecutor, StepRecord, StepResult};
pub use workspace::{ArtifactWriter, LocalWorkspace, PathLocks, Workspace, WorkspaceError};
