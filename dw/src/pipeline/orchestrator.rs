//! Orchestrator - drives one run through the stage machine
//!
//! Each oracle step's prompt is assembled from the previous step's typed
//! output, so after the request/analysis fork everything is strictly
//! sequential. Every await is raced against the run's cancellation token,
//! and nothing touches the filesystem until WRITE_ARTIFACT.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::sections::{check_preserved_sections, check_required_sections, section_headings};
use super::{LogProgress, PipelineError, PipelineRun, ProgressSink, RunOutcome, RunReport, Stage};
use crate::analyzer::{RepositoryAnalysis, RepositoryAnalyzer};
use crate::config::PipelineConfig;
use crate::patterns::{Pattern, PatternCatalog};
use crate::prompts::TemplateStore;
use crate::request::{ContentRequest, ContentRequestBuilder, truncate_chars};
use crate::step::{
    ContentArtifact, ContentStrategy, DirectorySelection, PatternSelection, StepExecutor, StepOutput, StepRecord,
    StrategyAction,
};
use crate::workspace::{ArtifactWriter, PathLocks, Workspace, count_words, normalize_filename, with_front_matter};

const MISSING_DIR_STATUS: &str = "directory does not exist yet";

/// Why a run stopped early
enum Halt {
    Failed(Stage, PipelineError),
    Cancelled,
}

/// Existing documents read before the strategy decision
struct ExistingDocs {
    status: String,
    files: Vec<String>,
    previews: Vec<(String, String)>,
}

impl ExistingDocs {
    fn missing() -> Self {
        Self {
            status: MISSING_DIR_STATUS.to_string(),
            files: Vec::new(),
            previews: Vec::new(),
        }
    }

    fn files_text(&self) -> String {
        if self.files.is_empty() {
            "(none)".to_string()
        } else {
            self.files.iter().map(|f| format!("- {}", f)).collect::<Vec<_>>().join("\n")
        }
    }

    fn content_text(&self) -> String {
        if self.previews.is_empty() {
            return "(no existing content)".to_string();
        }
        self.previews
            .iter()
            .map(|(name, preview)| format!("### {}\n{}", name, preview))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// The document to write and where it goes
struct WritePlan {
    action: StrategyAction,
    file: String,
    artifact: ContentArtifact,
    artifact_stage: Stage,
}

/// Sequences one pipeline run per call to [`run`](Self::run)
///
/// Shares nothing mutable between runs; one orchestrator can serve
/// concurrent runs.
pub struct Orchestrator<S> {
    executor: StepExecutor<S>,
    workspace: Arc<dyn Workspace>,
    catalog: Arc<PatternCatalog>,
    analyzer: Arc<RepositoryAnalyzer>,
    config: PipelineConfig,
    progress: Arc<dyn ProgressSink>,
    locks: Arc<PathLocks>,
}

impl<S: TemplateStore> Orchestrator<S> {
    pub fn new(
        executor: StepExecutor<S>,
        workspace: Arc<dyn Workspace>,
        catalog: Arc<PatternCatalog>,
        analyzer: RepositoryAnalyzer,
        config: PipelineConfig,
    ) -> Self {
        debug!(root = %workspace.root().display(), "Orchestrator::new: called");
        Self {
            executor,
            workspace,
            catalog,
            analyzer: Arc::new(analyzer),
            config,
            progress: Arc::new(LogProgress),
            locks: PathLocks::shared(),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_locks(mut self, locks: Arc<PathLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// Run the whole pipeline
    ///
    /// Never returns an error: failures and cancellation are outcomes, and
    /// the report always carries every step recorded so far.
    pub async fn run(&self, request: ContentRequestBuilder, cancel: &CancellationToken) -> RunReport {
        let mut run = PipelineRun::new();
        let run_id = run.id;
        info!(%run_id, root = %self.workspace.root().display(), "Pipeline run started");

        let outcome = match self.drive(&mut run, request, cancel).await {
            Ok((action, artifact_path)) => {
                info!(%run_id, outcome = "completed", %action, path = %artifact_path.display(), "Pipeline run finished");
                self.notify(Stage::Done, &format!("Wrote {}", artifact_path.display()));
                RunOutcome::Completed { action, artifact_path }
            }
            Err(Halt::Cancelled) => {
                let stage = run.stage();
                info!(%run_id, outcome = "cancelled", %stage, "Pipeline run cancelled");
                self.notify(Stage::Cancelled, &format!("Cancelled during {}", stage));
                RunOutcome::Cancelled { stage }
            }
            Err(Halt::Failed(stage, error)) => {
                warn!(%run_id, outcome = "failed", %stage, %error, "Pipeline run failed");
                self.notify(Stage::Failed, &format!("{} failed: {}", stage, error));
                RunOutcome::Failed {
                    stage,
                    kind: error.kind(),
                    error: error.to_string(),
                }
            }
        };

        run.finish(outcome)
    }

    async fn drive(
        &self,
        run: &mut PipelineRun,
        request: ContentRequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<(StrategyAction, PathBuf), Halt> {
        let (request, analysis) = self.prepare(run, request, cancel).await?;
        let mut vars = request.prompt_variables();

        // SELECT_DIRECTORY
        self.enter(run, Stage::SelectDirectory)?;
        vars.insert("repository_analysis".to_string(), analysis.summary());
        let selection: DirectorySelection = self.step(run, Stage::SelectDirectory, &vars, cancel).await?;
        let dir = self
            .directory_within_root(&selection.selected_directory)
            .map_err(|detail| self.reject(run, Stage::SelectDirectory, detail))?;
        let dir_label = display_dir(&dir);
        self.notify(
            Stage::SelectDirectory,
            &format!("Selected {} (confidence {:.2})", dir_label, selection.confidence),
        );

        let existing = guard(cancel, self.read_existing(&dir)).await?;
        debug!(dir = %dir_label, status = %existing.status, files = existing.files.len(), "Existing documents read");

        // DETERMINE_STRATEGY
        self.enter(run, Stage::DetermineStrategy)?;
        vars.insert("selected_directory".to_string(), dir_label.clone());
        vars.insert("directory_purpose".to_string(), selection.directory_purpose.clone());
        vars.insert("directory_status".to_string(), existing.status.clone());
        vars.insert("existing_files".to_string(), existing.files_text());
        vars.insert("existing_content".to_string(), existing.content_text());
        let strategy: ContentStrategy = self.step(run, Stage::DetermineStrategy, &vars, cancel).await?;
        let target = self
            .check_strategy(&strategy, &dir)
            .await
            .map_err(|detail| self.reject(run, Stage::DetermineStrategy, detail))?;
        self.notify(
            Stage::DetermineStrategy,
            &format!("{} (overlap {:.0}%)", strategy.action, strategy.content_overlap),
        );

        let plan = match target {
            None => self.create_branch(run, &mut vars, &dir, &strategy, cancel).await?,
            Some(target) => self.update_branch(run, &mut vars, &dir, &strategy, target, cancel).await?,
        };

        self.write(run, &dir, plan, cancel).await
    }

    /// BUILD_REQUEST and ANALYZE_REPO, run concurrently
    async fn prepare(
        &self,
        run: &mut PipelineRun,
        request: ContentRequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<(ContentRequest, RepositoryAnalysis), Halt> {
        self.enter(run, Stage::BuildRequest)?;

        let root = self.workspace.root().to_path_buf();
        let analyzer = self.analyzer.clone();
        let preview_chars = self.config.material_preview_chars;
        let build = async move { request.preview_chars(preview_chars).build() };
        let analyze = tokio::task::spawn_blocking(move || analyzer.analyze(&root));

        let (request, analysis) = guard(cancel, async { tokio::join!(build, analyze) }).await?;
        let request = match request {
            Ok(request) => request,
            Err(e) => return Err(self.fail_local(run, Stage::BuildRequest, e.into())),
        };

        run.record(
            Stage::BuildRequest,
            StepRecord::local(true, serde_json::to_value(&request).ok(), None),
        );
        run.request = Some(request.clone());
        self.notify(
            Stage::BuildRequest,
            &format!("Request built with {} input material(s)", request.input_materials.len()),
        );

        self.enter(run, Stage::AnalyzeRepo)?;
        let analysis = match analysis {
            Ok(Ok(analysis)) => analysis,
            Ok(Err(e)) => return Err(self.fail_local(run, Stage::AnalyzeRepo, PipelineError::Analyzer(e))),
            Err(join) => {
                let error = PipelineError::StepFailed {
                    stage: Stage::AnalyzeRepo,
                    error: format!("analyzer task failed: {}", join),
                };
                return Err(self.fail_local(run, Stage::AnalyzeRepo, error));
            }
        };
        run.record(
            Stage::AnalyzeRepo,
            StepRecord::local(true, serde_json::to_value(&analysis).ok(), None),
        );
        run.analysis = Some(analysis.clone());
        self.notify(
            Stage::AnalyzeRepo,
            &format!(
                "{} project, {} markdown file(s), organization: {}",
                analysis.project_type, analysis.markdown_file_count, analysis.organization_pattern
            ),
        );

        Ok((request, analysis))
    }

    /// SELECT_PATTERN then GENERATE_CONTENT
    async fn create_branch(
        &self,
        run: &mut PipelineRun,
        vars: &mut HashMap<String, String>,
        dir: &Path,
        strategy: &ContentStrategy,
        cancel: &CancellationToken,
    ) -> Result<WritePlan, Halt> {
        self.enter(run, Stage::SelectPattern)?;
        vars.insert("strategy_reasoning".to_string(), strategy.reasoning.clone());
        vars.insert("user_journey_context".to_string(), strategy.user_journey_context.clone());
        vars.insert("available_patterns".to_string(), self.catalog.describe());
        let selection: PatternSelection = self.step(run, Stage::SelectPattern, vars, cancel).await?;

        let pattern: &Pattern = self.catalog.get(&selection.pattern_id).ok_or_else(|| {
            self.reject(
                run,
                Stage::SelectPattern,
                format!("pattern '{}' is not in the catalog", selection.pattern_id),
            )
        })?;
        self.notify(Stage::SelectPattern, &format!("Pattern {} ({})", pattern.id, pattern.name));

        self.enter(run, Stage::GenerateContent)?;
        let required = pattern.required_sections();
        let terminal = pattern.terminal_sections();
        vars.insert("pattern_id".to_string(), pattern.id.clone());
        vars.insert("pattern_name".to_string(), pattern.name.clone());
        vars.insert("pattern_description".to_string(), pattern.description.clone());
        vars.insert("audience_alignment".to_string(), selection.audience_alignment.clone());
        vars.insert("required_sections".to_string(), numbered(&required));
        vars.insert(
            "terminal_sections".to_string(),
            if terminal.is_empty() { "(none)".to_string() } else { terminal.join(", ") },
        );
        let artifact: ContentArtifact = self.step(run, Stage::GenerateContent, vars, cancel).await?;

        check_required_sections(&artifact.content, &required, &terminal)
            .map_err(|detail| self.reject(run, Stage::GenerateContent, detail))?;
        let file = normalize_filename(&artifact.filename)
            .map_err(|detail| self.reject(run, Stage::GenerateContent, detail))?;
        if guard(cancel, self.workspace.exists(&dir.join(&file))).await? {
            return Err(self.reject(
                run,
                Stage::GenerateContent,
                format!("CREATE filename '{}' already exists in {}", file, display_dir(dir)),
            ));
        }
        self.notify(
            Stage::GenerateContent,
            &format!("Generated '{}' with {} section(s)", artifact.title, required.len()),
        );

        Ok(WritePlan {
            action: StrategyAction::Create,
            file,
            artifact,
            artifact_stage: Stage::GenerateContent,
        })
    }

    /// UPDATE_CONTENT against the full text of the target file
    async fn update_branch(
        &self,
        run: &mut PipelineRun,
        vars: &mut HashMap<String, String>,
        dir: &Path,
        strategy: &ContentStrategy,
        target: String,
        cancel: &CancellationToken,
    ) -> Result<WritePlan, Halt> {
        self.enter(run, Stage::UpdateContent)?;
        let original = match guard(cancel, self.workspace.read_file(&dir.join(&target))).await? {
            Ok(text) => text,
            Err(e) => return Err(self.fail_local(run, Stage::UpdateContent, e.into())),
        };
        let preserved = section_headings(&original);

        vars.insert("target_file".to_string(), target.clone());
        vars.insert("content_overlap".to_string(), format!("{:.0}", strategy.content_overlap));
        vars.insert(
            "existing_content_summary".to_string(),
            strategy.existing_content_summary.clone().unwrap_or_default(),
        );
        vars.insert("existing_document".to_string(), original.clone());
        vars.insert(
            "preserved_sections".to_string(),
            if preserved.is_empty() {
                "(none)".to_string()
            } else {
                preserved.iter().map(|s| format!("- {}", s)).collect::<Vec<_>>().join("\n")
            },
        );
        let artifact: ContentArtifact = self.step(run, Stage::UpdateContent, vars, cancel).await?;

        check_preserved_sections(&original, &artifact.content)
            .map_err(|detail| self.reject(run, Stage::UpdateContent, detail))?;
        self.notify(Stage::UpdateContent, &format!("Updated '{}'", target));

        Ok(WritePlan {
            action: StrategyAction::Update,
            file: target,
            artifact,
            artifact_stage: Stage::UpdateContent,
        })
    }

    /// WRITE_ARTIFACT, the only side effect of a run
    async fn write(
        &self,
        run: &mut PipelineRun,
        dir: &Path,
        mut plan: WritePlan,
        cancel: &CancellationToken,
    ) -> Result<(StrategyAction, PathBuf), Halt> {
        if cancel.is_cancelled() {
            return Err(Halt::Cancelled);
        }
        self.enter(run, Stage::WriteArtifact)?;

        if plan.artifact.metadata.word_count == 0 {
            plan.artifact.metadata.word_count = count_words(&plan.artifact.content);
            if let Ok(data) = serde_json::to_value(&plan.artifact) {
                run.set_data(plan.artifact_stage, data);
            }
        }
        let document = with_front_matter(&plan.artifact.content, &plan.artifact.front_matter);

        // Once started the write runs to completion; cancellation is only
        // honoured before this point.
        let writer = ArtifactWriter::new(self.workspace.clone(), self.locks.clone());
        let written = match plan.action {
            StrategyAction::Create => writer.create(dir, &plan.file, &document).await,
            StrategyAction::Update => writer.write(dir, &plan.file, &document).await,
        };
        let path = match written {
            Ok(path) => path,
            Err(e) => return Err(self.fail_local(run, Stage::WriteArtifact, e.into())),
        };

        run.record(
            Stage::WriteArtifact,
            StepRecord::local(
                true,
                Some(serde_json::json!({
                    "action": plan.action,
                    "path": path,
                    "wordCount": plan.artifact.metadata.word_count,
                })),
                None,
            ),
        );
        Ok((plan.action, path))
    }

    /// Render, ask, validate and record one oracle step
    async fn step<T: StepOutput>(
        &self,
        run: &mut PipelineRun,
        stage: Stage,
        vars: &HashMap<String, String>,
        cancel: &CancellationToken,
    ) -> Result<T, Halt> {
        let template = stage.template_id().ok_or_else(|| {
            Halt::Failed(
                stage,
                PipelineError::StepFailed {
                    stage,
                    error: "stage has no prompt template".to_string(),
                },
            )
        })?;
        debug!(%stage, %template, "Orchestrator::step: called");

        let attempts = self.config.max_step_attempts;
        let result = guard(cancel, self.executor.execute_with_retry::<T>(template, vars, attempts))
            .await?
            .map_err(|e| Halt::Failed(stage, e.into()))?;

        run.record(stage, result.record());
        match (result.success, result.data) {
            (true, Some(data)) => {
                info!(%stage, response_len = result.response.len(), "Step succeeded");
                Ok(data)
            }
            _ => {
                let error = result.error.unwrap_or_else(|| "step produced no data".to_string());
                Err(Halt::Failed(stage, PipelineError::StepFailed { stage, error }))
            }
        }
    }

    /// The selected directory relative to the root, or why it is unusable
    fn directory_within_root(&self, selected: &str) -> Result<PathBuf, String> {
        let trimmed = selected.trim().trim_end_matches(['/', '\\']);
        let resolved = self
            .workspace
            .resolve(Path::new(trimmed))
            .map_err(|_| format!("selectedDirectory '{}' is outside the workspace root", selected))?;
        let root = self.workspace.root();
        resolved
            .strip_prefix(root)
            .map(Path::to_path_buf)
            .map_err(|_| format!("selectedDirectory '{}' is outside the workspace root", selected))
    }

    /// Enforce CREATE/UPDATE exclusivity; returns the UPDATE target
    async fn check_strategy(&self, strategy: &ContentStrategy, dir: &Path) -> Result<Option<String>, String> {
        match (strategy.action, strategy.target()) {
            (StrategyAction::Create, None) => Ok(None),
            (StrategyAction::Create, Some(target)) => Err(format!("CREATE must not name a targetFile (got '{}')", target)),
            (StrategyAction::Update, None) => Err("UPDATE requires a targetFile".to_string()),
            (StrategyAction::Update, Some(target)) => {
                let dir_label = display_dir(dir);
                let target = target
                    .strip_prefix(&format!("{}/", dir_label))
                    .unwrap_or(target)
                    .to_string();

                let in_dir = match (self.workspace.resolve(dir), self.workspace.resolve(&dir.join(&target))) {
                    (Ok(d), Ok(t)) => t.starts_with(&d) && t != d,
                    _ => false,
                };
                if !in_dir {
                    return Err(format!("targetFile '{}' is not inside {}", target, dir_label));
                }
                let path = dir.join(&target);
                if !self.workspace.is_file(&path).await {
                    if self.workspace.exists(&path).await {
                        return Err(format!("targetFile '{}' in {} is not a regular file", target, dir_label));
                    }
                    return Err(format!("targetFile '{}' does not exist in {}", target, dir_label));
                }
                Ok(Some(target))
            }
        }
    }

    /// Bounded read of existing markdown documents in `dir`
    ///
    /// Any listing failure degrades to "directory does not exist yet".
    async fn read_existing(&self, dir: &Path) -> ExistingDocs {
        debug!(?dir, "Orchestrator::read_existing: called");
        let files = match self.workspace.list_files(dir).await {
            Ok(files) => files,
            Err(e) => {
                warn!(dir = %display_dir(dir), error = %e, "Cannot list selected directory, treating as new");
                return ExistingDocs::missing();
            }
        };

        let mut previews = Vec::new();
        for name in files
            .iter()
            .filter(|f| crate::analyzer::is_markdown(Path::new(f)))
            .take(self.config.existing_doc_limit)
        {
            match self.workspace.read_file(&dir.join(name)).await {
                Ok(text) => previews.push((name.clone(), truncate_chars(&text, self.config.existing_doc_preview_chars))),
                Err(e) => warn!(file = %name, error = %e, "Skipping unreadable existing document"),
            }
        }

        ExistingDocs {
            status: format!("directory exists with {} file(s)", files.len()),
            files,
            previews,
        }
    }

    fn enter(&self, run: &mut PipelineRun, stage: Stage) -> Result<(), Halt> {
        let from = run.stage();
        run.advance(stage).map_err(|e| Halt::Failed(from, e))?;
        info!(run_id = %run.id, %stage, "Entering stage");
        Ok(())
    }

    /// Flag a recorded step as a contract violation
    fn reject(&self, run: &mut PipelineRun, stage: Stage, detail: String) -> Halt {
        run.reject(stage, &detail);
        Halt::Failed(stage, PipelineError::contract(stage, detail))
    }

    /// Record a failed local (non-oracle) stage
    fn fail_local(&self, run: &mut PipelineRun, stage: Stage, error: PipelineError) -> Halt {
        run.record(stage, StepRecord::local(false, None, Some(error.to_string())));
        Halt::Failed(stage, error)
    }

    fn notify(&self, stage: Stage, message: &str) {
        self.progress.on_progress(stage, message);
    }
}

/// Race `fut` against cancellation
async fn guard<F: Future>(cancel: &CancellationToken, fut: F) -> Result<F::Output, Halt> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Halt::Cancelled),
        out = fut => Ok(out),
    }
}

fn display_dir(dir: &Path) -> String {
    let s = dir
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    if s.is_empty() { ".".to_string() } else { s }
}

fn numbered(items: &[&str]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {}", i + 1, s))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_dir() {
        assert_eq!(display_dir(Path::new("")), ".");
        assert_eq!(display_dir(Path::new("docs/guides")), "docs/guides");
    }

    #[test]
    fn test_numbered() {
        assert_eq!(numbered(&["A", "B"]), "1. A\n2. B");
    }

    #[test]
    fn test_existing_docs_text() {
        let docs = ExistingDocs::missing();
        assert_eq!(docs.files_text(), "(none)");
        assert_eq!(docs.content_text(), "(no existing content)");
        assert_eq!(docs.status, MISSING_DIR_STATUS);

        let docs = ExistingDocs {
            status: "directory exists with 1 file(s)".to_string(),
            files: vec!["auth.md".to_string()],
            previews: vec![("auth.md".to_string(), "# Auth".to_string())],
        };
        assert_eq!(docs.files_text(), "- auth.md");
        assert_eq!(docs.content_text(), "### auth.md\n# Auth");
    }
}
