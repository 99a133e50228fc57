//! Repository analyzer - summarizes how a workspace organizes its docs
//!
//! Read-only and side-effect free, so it can run alongside request building.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::AnalyzerConfig;

/// Root-level files that identify a build system or docs toolchain
const CONFIG_FILES: &[&str] = &[
    "Cargo.toml",
    "package.json",
    "tsconfig.json",
    "pyproject.toml",
    "setup.py",
    "requirements.txt",
    "go.mod",
    "pom.xml",
    "build.gradle",
    "build.gradle.kts",
    "Gemfile",
    "composer.json",
    "mkdocs.yml",
    "book.toml",
    "docusaurus.config.js",
    ".readthedocs.yml",
    "conf.py",
    "antora.yml",
];

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("No workspace at {}", .0.display())]
    NoWorkspace(PathBuf),

    #[error("Failed to walk {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Summary of a workspace, input to directory selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryAnalysis {
    pub root_path: PathBuf,
    pub project_type: String,
    /// Documentation directories relative to the root, `/`-separated
    pub documentation_dirs: Vec<String>,
    pub markdown_file_count: usize,
    pub config_files: Vec<String>,
    /// One of `docs-directory`, `distributed`, `flat`, `none`
    pub organization_pattern: String,
}

impl RepositoryAnalysis {
    /// Compact text for the directory-selection prompt
    pub fn summary(&self) -> String {
        let dirs = if self.documentation_dirs.is_empty() {
            "(none)".to_string()
        } else {
            self.documentation_dirs.join(", ")
        };
        let configs = if self.config_files.is_empty() {
            "(none)".to_string()
        } else {
            self.config_files.join(", ")
        };
        format!(
            "- Project type: {}\n- Documentation directories: {}\n- Markdown files: {}\n- Config files: {}\n- Organization: {}",
            self.project_type, dirs, self.markdown_file_count, configs, self.organization_pattern
        )
    }
}

pub struct RepositoryAnalyzer {
    config: AnalyzerConfig,
}

impl RepositoryAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    /// Walk `root` up to the configured depth and classify what it finds
    pub fn analyze(&self, root: &Path) -> Result<RepositoryAnalysis, AnalyzerError> {
        debug!(root = %root.display(), max_depth = self.config.max_depth, "RepositoryAnalyzer::analyze: called");
        if !root.is_dir() {
            return Err(AnalyzerError::NoWorkspace(root.to_path_buf()));
        }

        let skip = &self.config.skip_dirs;
        let walker = WalkDir::new(root)
            .max_depth(self.config.max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0 || !(e.file_type().is_dir() && skip.iter().any(|s| e.file_name() == s.as_str()))
            });

        let mut doc_dirs = BTreeSet::new();
        let mut markdown_dirs = BTreeSet::new();
        let mut markdown_count = 0;
        let mut config_files = Vec::new();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) if source.depth() == 0 => {
                    return Err(AnalyzerError::Walk {
                        path: root.to_path_buf(),
                        source,
                    });
                }
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                    continue;
                }
            };
            if entry.depth() == 0 {
                continue;
            }

            let rel = relative(root, entry.path());
            let name = entry.file_name().to_string_lossy();

            if entry.file_type().is_dir() {
                if self.is_doc_dir(&name) {
                    doc_dirs.insert(rel);
                }
            } else if is_markdown(entry.path()) {
                markdown_count += 1;
                let parent = entry
                    .path()
                    .parent()
                    .map(|p| relative(root, p))
                    .unwrap_or_default();
                markdown_dirs.insert(parent);
            } else if entry.depth() == 1 && CONFIG_FILES.contains(&&*name) {
                config_files.push(name.to_string());
            }
        }

        let analysis = RepositoryAnalysis {
            root_path: root.to_path_buf(),
            project_type: project_type(&config_files).to_string(),
            organization_pattern: organization_pattern(&doc_dirs, &markdown_dirs).to_string(),
            documentation_dirs: doc_dirs.into_iter().collect(),
            markdown_file_count: markdown_count,
            config_files,
        };

        info!(
            project_type = %analysis.project_type,
            doc_dirs = analysis.documentation_dirs.len(),
            markdown_files = analysis.markdown_file_count,
            organization = %analysis.organization_pattern,
            "Repository analyzed"
        );
        Ok(analysis)
    }

    fn is_doc_dir(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        self.config.doc_keywords.iter().any(|k| lower.contains(&k.to_lowercase()))
    }
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

pub(crate) fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("md") || e.eq_ignore_ascii_case("mdx"))
}

fn project_type(config_files: &[String]) -> &'static str {
    let has = |name: &str| config_files.iter().any(|f| f == name);
    if has("Cargo.toml") {
        "rust"
    } else if has("package.json") {
        "node"
    } else if has("pyproject.toml") || has("setup.py") {
        "python"
    } else if has("go.mod") {
        "go"
    } else if has("pom.xml") || has("build.gradle") || has("build.gradle.kts") {
        "java"
    } else {
        "unknown"
    }
}

fn organization_pattern(doc_dirs: &BTreeSet<String>, markdown_dirs: &BTreeSet<String>) -> &'static str {
    if doc_dirs.iter().any(|d| !d.contains('/')) {
        "docs-directory"
    } else if !doc_dirs.is_empty() || markdown_dirs.len() > 1 {
        "distributed"
    } else if !markdown_dirs.is_empty() {
        "flat"
    } else {
        "none"
    }
}
