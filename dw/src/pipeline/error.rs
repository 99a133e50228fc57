//! Pipeline errors

use serde::Serialize;
use thiserror::Error;

use super::Stage;
use crate::analyzer::AnalyzerError;
use crate::prompts::PromptError;
use crate::request::RequestError;
use crate::workspace::WorkspaceError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Contract violation in {stage}: {detail}")]
    ContractViolation { stage: Stage, detail: String },

    #[error("{stage} failed: {error}")]
    StepFailed { stage: Stage, error: String },

    #[error("Workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("Analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),

    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    #[error("Invalid request: {0}")]
    Request(#[from] RequestError),

    #[error("Invalid stage transition {from} -> {to}")]
    InvalidTransition { from: Stage, to: Stage },
}

/// Coarse classification of a failed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    ContractViolation,
    StepFailed,
    Workspace,
    Analyzer,
    Prompt,
    InvalidRequest,
    Internal,
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::ContractViolation { .. } => FailureKind::ContractViolation,
            Self::StepFailed { .. } => FailureKind::StepFailed,
            Self::Workspace(_) => FailureKind::Workspace,
            Self::Analyzer(_) => FailureKind::Analyzer,
            Self::Prompt(_) => FailureKind::Prompt,
            Self::Request(_) => FailureKind::InvalidRequest,
            Self::InvalidTransition { .. } => FailureKind::Internal,
        }
    }

    pub(crate) fn contract(stage: Stage, detail: impl Into<String>) -> Self {
        Self::ContractViolation {
            stage,
            detail: detail.into(),
        }
    }
}
