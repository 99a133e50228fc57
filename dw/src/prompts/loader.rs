//! Template stores

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::embedded;

/// Read-only source of prompt templates keyed by id
pub trait TemplateStore: Send + Sync {
    fn load(&self, id: &str) -> Option<String>;
}

impl<T: TemplateStore + ?Sized> TemplateStore for std::sync::Arc<T> {
    fn load(&self, id: &str) -> Option<String> {
        (**self).load(id)
    }
}

/// Loads templates from override directories, falling back to embedded ones
#[derive(Debug, Clone, Default)]
pub struct PromptLoader {
    /// Directories searched in order for `{id}.pmt`
    override_dirs: Vec<PathBuf>,
}

impl PromptLoader {
    /// Loader for a workspace root and an optional configured directory
    pub fn new(root: impl AsRef<Path>, configured_dir: Option<&Path>) -> Self {
        let root = root.as_ref();
        debug!(?root, ?configured_dir, "PromptLoader::new: called");
        let override_dirs: Vec<PathBuf> = configured_dir
            .map(Path::to_path_buf)
            .into_iter()
            .chain(std::iter::once(root.join(".docweaver/prompts")))
            .filter(|d| d.is_dir())
            .collect();
        debug!(?override_dirs, "PromptLoader::new: override directories");
        Self { override_dirs }
    }

    /// Loader that only uses embedded prompts
    pub fn embedded_only() -> Self {
        Self::default()
    }
}

impl TemplateStore for PromptLoader {
    fn load(&self, id: &str) -> Option<String> {
        debug!(%id, "PromptLoader::load: called");
        for dir in &self.override_dirs {
            let path = dir.join(format!("{}.pmt", id));
            if !path.exists() {
                continue;
            }
            match std::fs::read_to_string(&path) {
                Ok(content) => {
                    debug!(?path, "PromptLoader::load: found override");
                    return Some(content);
                }
                Err(e) => warn!("Failed to read prompt override {}: {}", path.display(), e),
            }
        }
        embedded::get_embedded(id).map(str::to_string)
    }
}

/// In-memory template store
#[derive(Debug, Clone, Default)]
pub struct MemoryTemplates {
    templates: HashMap<String, String>,
}

impl MemoryTemplates {
    pub fn new<I, K, V>(templates: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            templates: templates.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl TemplateStore for MemoryTemplates {
    fn load(&self, id: &str) -> Option<String> {
        self.templates.get(id).cloned()
    }
}
