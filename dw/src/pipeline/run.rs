//! Per-run working state and the report handed back to the caller

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::{FailureKind, PipelineError, Stage};
use crate::analyzer::RepositoryAnalysis;
use crate::request::ContentRequest;
use crate::step::{StepRecord, StrategyAction};

/// Working state of one run, owned by the orchestrator
#[derive(Debug)]
pub struct PipelineRun {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    stage: Stage,
    pub request: Option<ContentRequest>,
    pub analysis: Option<RepositoryAnalysis>,
    steps: BTreeMap<Stage, StepRecord>,
}

impl PipelineRun {
    pub fn new() -> Self {
        let id = Uuid::now_v7();
        debug!(%id, "PipelineRun::new: called");
        Self {
            id,
            started_at: Utc::now(),
            stage: Stage::Init,
            request: None,
            analysis: None,
            steps: BTreeMap::new(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Move to `next`, enforcing the state machine
    pub fn advance(&mut self, next: Stage) -> Result<(), PipelineError> {
        if !self.stage.can_transition_to(next) {
            return Err(PipelineError::InvalidTransition {
                from: self.stage,
                to: next,
            });
        }
        debug!(run_id = %self.id, from = %self.stage, to = %next, "PipelineRun::advance");
        self.stage = next;
        Ok(())
    }

    pub fn record(&mut self, stage: Stage, record: StepRecord) {
        self.steps.insert(stage, record);
    }

    pub fn step(&self, stage: Stage) -> Option<&StepRecord> {
        self.steps.get(&stage)
    }

    /// Mark a recorded step as rejected by a run-level contract check
    pub fn reject(&mut self, stage: Stage, detail: &str) {
        if let Some(record) = self.steps.get_mut(&stage) {
            record.success = false;
            record.error = Some(detail.to_string());
        }
    }

    /// Replace the recorded payload of a step
    pub fn set_data(&mut self, stage: Stage, data: Value) {
        if let Some(record) = self.steps.get_mut(&stage) {
            record.data = Some(data);
        }
    }

    /// Close the run with `outcome`, keeping every recorded step
    pub fn finish(mut self, outcome: RunOutcome) -> RunReport {
        let last_stage = self.stage;
        self.stage = match outcome {
            RunOutcome::Completed { .. } => Stage::Done,
            RunOutcome::Failed { .. } => Stage::Failed,
            RunOutcome::Cancelled { .. } => Stage::Cancelled,
        };
        debug!(run_id = %self.id, %last_stage, final_stage = %self.stage, "PipelineRun::finish");
        RunReport {
            run_id: self.id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            outcome,
            request: self.request,
            analysis: self.analysis,
            steps: self.steps,
        }
    }
}

impl Default for PipelineRun {
    fn default() -> Self {
        Self::new()
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed {
        action: StrategyAction,
        artifact_path: PathBuf,
    },
    Failed {
        stage: Stage,
        kind: FailureKind,
        error: String,
    },
    /// Not a failure: the caller asked the run to stop
    Cancelled { stage: Stage },
}

/// Everything a caller gets back from a run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RunOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<ContentRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<RepositoryAnalysis>,
    pub steps: BTreeMap<Stage, StepRecord>,
}

impl RunReport {
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, RunOutcome::Failed { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.outcome, RunOutcome::Cancelled { .. })
    }

    pub fn artifact_path(&self) -> Option<&PathBuf> {
        match &self.outcome {
            RunOutcome::Completed { artifact_path, .. } => Some(artifact_path),
            _ => None,
        }
    }

    /// Stages whose step succeeded, in pipeline order
    pub fn succeeded(&self) -> Vec<Stage> {
        self.steps
            .iter()
            .filter(|(_, r)| r.success)
            .map(|(s, _)| *s)
            .collect()
    }
}
