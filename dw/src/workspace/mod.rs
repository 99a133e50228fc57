//! Workspace access - the narrow filesystem surface the pipeline uses
//!
//! Every read and write goes through [`Workspace`] with paths relative to
//! the workspace root, so tests can swap in a fake and nothing escapes the
//! root.

mod local;
mod lock;
mod writer;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

pub use local::LocalWorkspace;
pub use lock::PathLocks;
pub use writer::{ArtifactWriter, count_words, normalize_filename, with_front_matter};

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Path {} escapes workspace {}", path.display(), root.display())]
    SandboxViolation { path: PathBuf, root: PathBuf },

    #[error("Not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WorkspaceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => WorkspaceError::NotFound(path),
            std::io::ErrorKind::AlreadyExists => WorkspaceError::AlreadyExists(path),
            _ => WorkspaceError::Io { path, source },
        }
    }
}

/// Filesystem provider scoped to one root
///
/// Paths are relative to [`root`](Workspace::root); implementations reject
/// anything that resolves outside it.
#[async_trait]
pub trait Workspace: Send + Sync {
    fn root(&self) -> &Path;

    /// Absolute, sandbox-checked form of `path`
    fn resolve(&self, path: &Path) -> Result<PathBuf, WorkspaceError>;

    /// Names of the regular files directly inside `dir`, sorted
    async fn list_files(&self, dir: &Path) -> Result<Vec<String>, WorkspaceError>;

    async fn read_file(&self, path: &Path) -> Result<String, WorkspaceError>;

    async fn write_file(&self, path: &Path, content: &str) -> Result<(), WorkspaceError>;

    /// Write a file that must not exist yet; fails with `AlreadyExists` otherwise
    async fn create_file(&self, path: &Path, content: &str) -> Result<(), WorkspaceError>;

    async fn exists(&self, path: &Path) -> bool;

    /// True only for an existing regular file
    async fn is_file(&self, path: &Path) -> bool;

    async fn mkdir_recursive(&self, path: &Path) -> Result<(), WorkspaceError>;
}
