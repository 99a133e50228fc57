//! Pattern catalog - declarative documentation templates
//!
//! A pattern is an ordered list of sections, some of which are terminal and
//! must close the document. The catalog is loaded once and shared read-only.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum PatternError {
    #[error("Failed to read pattern catalog {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse pattern catalog: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid pattern catalog: {0}")]
    Invalid(String),
}

/// One section of a pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSection {
    pub name: String,
    /// Must appear after every non-terminal section
    #[serde(default)]
    pub terminal: bool,
}

/// A named documentation template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub sections: Vec<PatternSection>,
}

impl Pattern {
    fn new(id: &str, name: &str, description: &str, sections: &[&str], terminal: &[&str]) -> Self {
        let sections = sections
            .iter()
            .map(|s| PatternSection {
                name: s.to_string(),
                terminal: false,
            })
            .chain(terminal.iter().map(|s| PatternSection {
                name: s.to_string(),
                terminal: true,
            }))
            .collect();
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            sections,
        }
    }

    /// Every section name, in document order
    pub fn required_sections(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.name.as_str()).collect()
    }

    /// Names of the sections that must come last
    pub fn terminal_sections(&self) -> Vec<&str> {
        self.sections
            .iter()
            .filter(|s| s.terminal)
            .map(|s| s.name.as_str())
            .collect()
    }

    fn check(&self) -> Result<(), PatternError> {
        if self.id.trim().is_empty() {
            return Err(PatternError::Invalid("pattern with empty id".to_string()));
        }
        if self.sections.is_empty() {
            return Err(PatternError::Invalid(format!("pattern '{}' has no sections", self.id)));
        }
        if let Some(first_terminal) = self.sections.iter().position(|s| s.terminal)
            && self.sections[first_terminal..].iter().any(|s| !s.terminal)
        {
            return Err(PatternError::Invalid(format!(
                "pattern '{}' lists a non-terminal section after a terminal one",
                self.id
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    patterns: Vec<Pattern>,
}

/// Read-only registry of patterns
#[derive(Debug, Clone)]
pub struct PatternCatalog {
    patterns: Vec<Pattern>,
}

impl PatternCatalog {
    /// The built-in pattern set
    pub fn builtin() -> Self {
        debug!("PatternCatalog::builtin: called");
        Self {
            patterns: vec![
                Pattern::new(
                    "quickstart",
                    "Quickstart",
                    "Gets a new user to a first working result as fast as possible.",
                    &["Prerequisites", "Procedure"],
                    &["Next Steps"],
                ),
                Pattern::new(
                    "tutorial",
                    "Tutorial",
                    "A guided lesson that builds one complete example step by step.",
                    &["Overview", "Prerequisites", "Steps", "Summary"],
                    &["Next Steps"],
                ),
                Pattern::new(
                    "how-to",
                    "How-to Guide",
                    "Task-focused instructions for a reader who knows what they want to achieve.",
                    &["Overview", "Before You Begin", "Procedure", "Verification"],
                    &["Related Resources"],
                ),
                Pattern::new(
                    "concept",
                    "Concept",
                    "Explains what something is and how it works, without procedures.",
                    &["Overview", "How It Works", "Key Concepts"],
                    &["Related Resources"],
                ),
                Pattern::new(
                    "reference",
                    "Reference",
                    "Complete, scannable description of an API, command or configuration surface.",
                    &["Overview", "Syntax", "Parameters", "Examples"],
                    &["See Also"],
                ),
                Pattern::new(
                    "troubleshooting",
                    "Troubleshooting",
                    "Symptoms, causes and fixes for known problems.",
                    &["Overview", "Symptoms", "Causes", "Solutions"],
                    &["Getting Help"],
                ),
            ],
        }
    }

    /// Load from a YAML file, falling back to the built-in set
    ///
    /// A missing, unreadable or invalid file is never fatal.
    pub fn load(path: Option<&Path>) -> Self {
        debug!(?path, "PatternCatalog::load: called");
        let Some(path) = path else {
            return Self::builtin();
        };

        match Self::load_from_file(path) {
            Ok(catalog) => {
                info!("Loaded {} patterns from {}", catalog.patterns.len(), path.display());
                catalog
            }
            Err(e) => {
                warn!("Failed to load pattern catalog from {}: {}; using built-in patterns", path.display(), e);
                Self::builtin()
            }
        }
    }

    fn load_from_file(path: &Path) -> Result<Self, PatternError> {
        let content = fs::read_to_string(path).map_err(|source| PatternError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse and validate a catalog document (`patterns: [...]`)
    pub fn from_yaml(yaml: &str) -> Result<Self, PatternError> {
        let file: CatalogFile = serde_yaml::from_str(yaml)?;
        if file.patterns.is_empty() {
            return Err(PatternError::Invalid("catalog has no patterns".to_string()));
        }

        let mut seen = HashSet::new();
        for pattern in &file.patterns {
            pattern.check()?;
            if !seen.insert(pattern.id.as_str()) {
                return Err(PatternError::Invalid(format!("duplicate pattern id '{}'", pattern.id)));
            }
        }
        Ok(Self { patterns: file.patterns })
    }

    pub fn available_patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn get(&self, id: &str) -> Option<&Pattern> {
        self.patterns.iter().find(|p| p.id == id)
    }

    /// Catalog listing for the pattern-selection prompt
    pub fn describe(&self) -> String {
        self.patterns
            .iter()
            .map(|p| {
                format!(
                    "- `{}` ({}): {}\n  Sections: {}",
                    p.id,
                    p.name,
                    p.description,
                    p.required_sections().join(" → ")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for PatternCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_builtin_quickstart() {
        let catalog = PatternCatalog::builtin();
        let quickstart = catalog.get("quickstart").unwrap();

        assert_eq!(quickstart.required_sections(), vec!["Prerequisites", "Procedure", "Next Steps"]);
        assert_eq!(quickstart.terminal_sections(), vec!["Next Steps"]);
        assert!(catalog.get("nope").is_none());
    }

    #[test]
    fn test_builtin_patterns_are_valid() {
        let catalog = PatternCatalog::builtin();
        assert!(catalog.available_patterns().len() >= 5);
        for p in catalog.available_patterns() {
            p.check().unwrap();
        }
    }

    #[test]
    fn test_describe_lists_every_id() {
        let catalog = PatternCatalog::builtin();
        let text = catalog.describe();
        for p in catalog.available_patterns() {
            assert!(text.contains(&format!("`{}`", p.id)));
        }
    }

    #[test]
    fn test_load_from_yaml_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("patterns.yml");
        fs::write(
            &path,
            r#"
patterns:
  - id: faq
    name: FAQ
    sections:
      - name: Questions
      - name: Contact
        terminal: true
"#,
        )
        .unwrap();

        let catalog = PatternCatalog::load(Some(&path));
        assert_eq!(catalog.available_patterns().len(), 1);
        assert_eq!(catalog.get("faq").unwrap().terminal_sections(), vec!["Contact"]);
    }

    #[test]
    fn test_missing_file_falls_back_to_builtin() {
        let catalog = PatternCatalog::load(Some(Path::new("/nonexistent/patterns.yml")));
        assert!(catalog.get("quickstart").is_some());
    }

    #[test]
    fn test_rejects_terminal_before_regular_section() {
        let err = PatternCatalog::from_yaml(
            r#"
patterns:
  - id: bad
    name: Bad
    sections:
      - name: End
        terminal: true
      - name: Middle
"#,
        )
        .unwrap_err();
        assert!(matches!(&err, PatternError::Invalid(msg) if msg.contains("after a terminal")));
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let err = PatternCatalog::from_yaml(
            r#"
patterns:
  - id: a
    name: A
    sections: [{name: X}]
  - id: a
    name: A again
    sections: [{name: Y}]
"#,
        )
        .unwrap_err();
        assert!(matches!(&err, PatternError::Invalid(msg) if msg.contains("duplicate")));
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        let err = PatternCatalog::from_yaml("patterns: [unclosed").unwrap_err();
        assert!(matches!(err, PatternError::Parse(_)));
        assert!(err.to_string().starts_with("Failed to parse pattern catalog"));
    }

    #[test]
    fn test_unreadable_file_is_io_error() {
        let err = PatternCatalog::load_from_file(Path::new("/nonexistent/patterns.yml")).unwrap_err();
        assert!(matches!(err, PatternError::Io { .. }));
    }
}
