//! LocalWorkspace - the real filesystem under a root directory

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{Workspace, WorkspaceError};

/// Disk-backed workspace sandboxed to `root`
#[derive(Debug, Clone)]
pub struct LocalWorkspace {
    root: PathBuf,
}

impl LocalWorkspace {
    /// Open `root`, which must be an existing directory
    pub fn new(root: impl AsRef<Path>) -> Result<Self, WorkspaceError> {
        let root = root.as_ref();
        debug!(root = %root.display(), "LocalWorkspace::new: called");
        let root = root.canonicalize().map_err(|e| WorkspaceError::io(root, e))?;
        if !root.is_dir() {
            return Err(WorkspaceError::NotFound(root));
        }
        Ok(Self { root })
    }
}

/// Resolve `.` and `..` without touching the filesystem
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Canonicalize the deepest existing ancestor and re-append the rest
///
/// Catches symlinks pointing out of the root while still allowing paths
/// that do not exist yet.
fn canonicalize_existing_prefix(path: &Path) -> PathBuf {
    let mut existing = path.to_path_buf();
    let mut rest = Vec::new();
    while !existing.exists() {
        match (existing.file_name().map(|n| n.to_os_string()), existing.parent()) {
            (Some(name), Some(parent)) => {
                rest.push(name);
                existing = parent.to_path_buf();
            }
            _ => return path.to_path_buf(),
        }
    }

    let mut resolved = existing.canonicalize().unwrap_or(existing);
    for name in rest.into_iter().rev() {
        resolved.push(name);
    }
    resolved
}

#[async_trait]
impl Workspace for LocalWorkspace {
    fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> Result<PathBuf, WorkspaceError> {
        debug!(?path, "LocalWorkspace::resolve: called");
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let resolved = canonicalize_existing_prefix(&lexical_normalize(&joined));

        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            debug!(?resolved, "LocalWorkspace::resolve: sandbox violation");
            Err(WorkspaceError::SandboxViolation {
                path: path.to_path_buf(),
                root: self.root.clone(),
            })
        }
    }

    async fn list_files(&self, dir: &Path) -> Result<Vec<String>, WorkspaceError> {
        debug!(?dir, "LocalWorkspace::list_files: called");
        let full = self.resolve(dir)?;
        let mut entries = tokio::fs::read_dir(&full)
            .await
            .map_err(|e| WorkspaceError::io(&full, e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| WorkspaceError::io(&full, e))? {
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if is_file {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        debug!(count = names.len(), "LocalWorkspace::list_files: done");
        Ok(names)
    }

    async fn read_file(&self, path: &Path) -> Result<String, WorkspaceError> {
        debug!(?path, "LocalWorkspace::read_file: called");
        let full = self.resolve(path)?;
        tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| WorkspaceError::io(&full, e))
    }

    async fn write_file(&self, path: &Path, content: &str) -> Result<(), WorkspaceError> {
        debug!(?path, content_len = content.len(), "LocalWorkspace::write_file: called");
        let full = self.resolve(path)?;
        tokio::fs::write(&full, content)
            .await
            .map_err(|e| WorkspaceError::io(&full, e))
    }

    async fn create_file(&self, path: &Path, content: &str) -> Result<(), WorkspaceError> {
        debug!(?path, content_len = content.len(), "LocalWorkspace::create_file: called");
        let full = self.resolve(path)?;
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full)
            .await
            .map_err(|e| WorkspaceError::io(&full, e))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| WorkspaceError::io(&full, e))?;
        file.flush().await.map_err(|e| WorkspaceError::io(&full, e))
    }

    async fn exists(&self, path: &Path) -> bool {
        match self.resolve(path) {
            Ok(full) => tokio::fs::try_exists(&full).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn is_file(&self, path: &Path) -> bool {
        match self.resolve(path) {
            Ok(full) => tokio::fs::metadata(&full).await.map(|m| m.is_file()).unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn mkdir_recursive(&self, path: &Path) -> Result<(), WorkspaceError> {
        debug!(?path, "LocalWorkspace::mkdir_recursive: called");
        let full = self.resolve(path)?;
        tokio::fs::create_dir_all(&full)
            .await
            .map_err(|e| WorkspaceError::io(&full, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_lexical_normalize() {
        assert_eq!(lexical_normalize(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
        assert_eq!(lexical_normalize(Path::new("docs/../../x")), PathBuf::from("../x"));
    }

    #[test]
    fn test_resolve_inside_and_outside() {
        let temp = tempdir().unwrap();
        let ws = LocalWorkspace::new(temp.path()).unwrap();

        let inside = ws.resolve(Path::new("docs/new/file.md")).unwrap();
        assert!(inside.starts_with(ws.root()));

        assert!(matches!(
            ws.resolve(Path::new("docs/../../escape.md")),
            Err(WorkspaceError::SandboxViolation { .. })
        ));
        assert!(ws.resolve(Path::new("/etc/passwd")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_rejects_symlink_escape() {
        let temp = tempdir().unwrap();
        let outside = tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), temp.path().join("link")).unwrap();

        let ws = LocalWorkspace::new(temp.path()).unwrap();
        assert!(ws.resolve(Path::new("link/file.md")).is_err());
    }

    #[tokio::test]
    async fn test_list_files_only_returns_files() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("docs/sub")).unwrap();
        fs::write(temp.path().join("docs/b.md"), "b").unwrap();
        fs::write(temp.path().join("docs/a.md"), "a").unwrap();

        let ws = LocalWorkspace::new(temp.path()).unwrap();
        assert_eq!(ws.list_files(Path::new("docs")).await.unwrap(), vec!["a.md", "b.md"]);
    }

    #[tokio::test]
    async fn test_list_missing_dir_is_not_found() {
        let temp = tempdir().unwrap();
        let ws = LocalWorkspace::new(temp.path()).unwrap();
        assert!(matches!(
            ws.list_files(Path::new("docs")).await,
            Err(WorkspaceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_mkdir_write_read_exists() {
        let temp = tempdir().unwrap();
        let ws = LocalWorkspace::new(temp.path()).unwrap();

        assert!(!ws.exists(Path::new("docs/guide.md")).await);
        ws.mkdir_recursive(Path::new("docs")).await.unwrap();
        ws.write_file(Path::new("docs/guide.md"), "# Guide").await.unwrap();

        assert!(ws.exists(Path::new("docs/guide.md")).await);
        assert_eq!(ws.read_file(Path::new("docs/guide.md")).await.unwrap(), "# Guide");
        assert!(!ws.exists(Path::new("../outside.md")).await);
    }

    #[tokio::test]
    async fn test_create_file_refuses_existing() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("keep.md"), "original").unwrap();
        let ws = LocalWorkspace::new(temp.path()).unwrap();

        ws.create_file(Path::new("new.md"), "fresh").await.unwrap();
        assert_eq!(fs::read_to_string(temp.path().join("new.md")).unwrap(), "fresh");

        let err = ws.create_file(Path::new("keep.md"), "clobber").await.unwrap_err();
        assert!(matches!(err, WorkspaceError::AlreadyExists(_)));
        assert_eq!(fs::read_to_string(temp.path().join("keep.md")).unwrap(), "original");
    }

    #[tokio::test]
    async fn test_is_file_distinguishes_directories() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("docs/sub")).unwrap();
        fs::write(temp.path().join("docs/a.md"), "a").unwrap();
        let ws = LocalWorkspace::new(temp.path()).unwrap();

        assert!(ws.is_file(Path::new("docs/a.md")).await);
        assert!(!ws.is_file(Path::new("docs/sub")).await);
        assert!(ws.exists(Path::new("docs/sub")).await);
        assert!(!ws.is_file(Path::new("docs/missing.md")).await);
    }

    #[test]
    fn test_new_requires_existing_root() {
        assert!(LocalWorkspace::new("/nonexistent/root").is_err());
    }
}
