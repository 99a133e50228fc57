//! Pipeline stages and the transitions between them

use std::fmt;

use serde::Serialize;
use tracing::debug;

/// A pipeline stage
///
/// Variants are declared in pipeline order, so the derived `Ord` sorts a
/// run's step map the way the run executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Init,
    BuildRequest,
    AnalyzeRepo,
    SelectDirectory,
    DetermineStrategy,
    SelectPattern,
    GenerateContent,
    UpdateContent,
    WriteArtifact,
    Done,
    Failed,
    Cancelled,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::BuildRequest => "BUILD_REQUEST",
            Self::AnalyzeRepo => "ANALYZE_REPO",
            Self::SelectDirectory => "SELECT_DIRECTORY",
            Self::DetermineStrategy => "DETERMINE_STRATEGY",
            Self::SelectPattern => "SELECT_PATTERN",
            Self::GenerateContent => "GENERATE_CONTENT",
            Self::UpdateContent => "UPDATE_CONTENT",
            Self::WriteArtifact => "WRITE_ARTIFACT",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Prompt template consulted by this stage, if it asks the oracle
    pub fn template_id(&self) -> Option<&'static str> {
        match self {
            Self::SelectDirectory => Some("select-directory"),
            Self::DetermineStrategy => Some("determine-strategy"),
            Self::SelectPattern => Some("select-pattern"),
            Self::GenerateContent => Some("generate-content"),
            Self::UpdateContent => Some("update-content"),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }

    /// Whether the state machine allows `self -> next`
    pub fn can_transition_to(&self, next: Stage) -> bool {
        debug!(from = %self, to = %next, "Stage::can_transition_to: called");
        if self.is_terminal() {
            return false;
        }
        if matches!(next, Self::Failed | Self::Cancelled) {
            return true;
        }
        matches!(
            (self, next),
            (Self::Init, Self::BuildRequest)
                | (Self::BuildRequest, Self::AnalyzeRepo)
                | (Self::AnalyzeRepo, Self::SelectDirectory)
                | (Self::SelectDirectory, Self::DetermineStrategy)
                | (Self::DetermineStrategy, Self::SelectPattern)
                | (Self::DetermineStrategy, Self::UpdateContent)
                | (Self::SelectPattern, Self::GenerateContent)
                | (Self::GenerateContent, Self::WriteArtifact)
                | (Self::UpdateContent, Self::WriteArtifact)
                | (Self::WriteArtifact, Self::Done)
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_update_paths() {
        let create = [
            Stage::Init,
            Stage::BuildRequest,
            Stage::AnalyzeRepo,
            Stage::SelectDirectory,
            Stage::DetermineStrategy,
            Stage::SelectPattern,
            Stage::GenerateContent,
            Stage::WriteArtifact,
            Stage::Done,
        ];
        for pair in create.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }

        assert!(Stage::DetermineStrategy.can_transition_to(Stage::UpdateContent));
        assert!(Stage::UpdateContent.can_transition_to(Stage::WriteArtifact));
    }

    #[test]
    fn test_update_branch_skips_pattern_selection() {
        assert!(!Stage::UpdateContent.can_transition_to(Stage::SelectPattern));
        assert!(!Stage::UpdateContent.can_transition_to(Stage::GenerateContent));
        assert!(!Stage::SelectDirectory.can_transition_to(Stage::WriteArtifact));
    }

    #[test]
    fn test_terminal_states() {
        assert!(Stage::GenerateContent.can_transition_to(Stage::Failed));
        assert!(Stage::SelectDirectory.can_transition_to(Stage::Cancelled));
        assert!(!Stage::Done.can_transition_to(Stage::Failed));
        assert!(!Stage::Failed.can_transition_to(Stage::Cancelled));
        assert!(Stage::Cancelled.is_terminal());
    }

    #[test]
    fn test_order_follows_pipeline() {
        assert!(Stage::SelectDirectory < Stage::DetermineStrategy);
        assert!(Stage::UpdateContent < Stage::WriteArtifact);
        assert_eq!(serde_json::to_value(Stage::WriteArtifact).unwrap(), "WRITE_ARTIFACT");
    }

    #[test]
    fn test_template_ids() {
        assert_eq!(Stage::SelectPattern.template_id(), Some("select-pattern"));
        assert_eq!(Stage::WriteArtifact.template_id(), None);
    }
}
