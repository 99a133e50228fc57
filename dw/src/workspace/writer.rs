//! ArtifactWriter - the pipeline's only side-effecting step

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{PathLocks, Workspace, WorkspaceError};

/// Persists documents into the workspace under a per-path lock
pub struct ArtifactWriter {
    workspace: Arc<dyn Workspace>,
    locks: Arc<PathLocks>,
}

impl ArtifactWriter {
    pub fn new(workspace: Arc<dyn Workspace>, locks: Arc<PathLocks>) -> Self {
        Self { workspace, locks }
    }

    /// Ensure `dir` exists and write `content` to `dir/filename`
    ///
    /// Returns the absolute path written.
    pub async fn write(&self, dir: &Path, filename: &str, content: &str) -> Result<PathBuf, WorkspaceError> {
        debug!(?dir, %filename, content_len = content.len(), "ArtifactWriter::write: called");
        let relative = dir.join(filename);
        let absolute = self.workspace.resolve(&relative)?;

        let _guard = self.locks.lock(&absolute).await;
        self.workspace.mkdir_recursive(dir).await?;
        self.workspace.write_file(&relative, content).await?;

        info!(path = %absolute.display(), bytes = content.len(), "Artifact written");
        Ok(absolute)
    }

    /// Like [`write`](Self::write), but fails with `AlreadyExists` instead of
    /// replacing a file that is already there
    pub async fn create(&self, dir: &Path, filename: &str, content: &str) -> Result<PathBuf, WorkspaceError> {
        debug!(?dir, %filename, content_len = content.len(), "ArtifactWriter::create: called");
        let relative = dir.join(filename);
        let absolute = self.workspace.resolve(&relative)?;

        let _guard = self.locks.lock(&absolute).await;
        self.workspace.mkdir_recursive(dir).await?;
        self.workspace.create_file(&relative, content).await?;

        info!(path = %absolute.display(), bytes = content.len(), "Artifact created");
        Ok(absolute)
    }
}

/// Validate a CREATE filename and complete a missing extension with `.md`
pub fn normalize_filename(name: &str) -> Result<String, String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("filename is empty".to_string());
    }
    if name.contains('/') || name.contains('\\') {
        return Err(format!("filename '{}' must not contain a directory part", name));
    }
    if name == "." || name.contains("..") {
        return Err(format!("filename '{}' must not contain '..'", name));
    }
    if Path::new(name).extension().is_none() {
        return Ok(format!("{}.md", name));
    }
    Ok(name.to_string())
}

/// Prepend a YAML front-matter block unless the content already has one
pub fn with_front_matter(content: &str, front_matter: &BTreeMap<String, String>) -> String {
    if front_matter.is_empty() || content.trim_start().starts_with("---") {
        return content.to_string();
    }
    match serde_yaml::to_string(front_matter) {
        Ok(yaml) => format!("---\n{}---\n\n{}", yaml, content),
        Err(e) => {
            warn!("Failed to render front matter, writing content without it: {}", e);
            content.to_string()
        }
    }
}

pub fn count_words(content: &str) -> u64 {
    content.split_whitespace().count() as u64
}
