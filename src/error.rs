//! Error types for graph validation, configuration, and state import.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of structural defect found while validating a skill graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GraphIssueKind {
    CycleDetected,
    MissingPrerequisite,
    DuplicateSkill,
}

impl GraphIssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CycleDetected => "CYCLE_DETECTED",
            Self::MissingPrerequisite => "MISSING_PREREQUISITE",
            Self::DuplicateSkill => "DUPLICATE_SKILL",
        }
    }
}

/// One validation finding with the skill ids involved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphIssue {
    pub kind: GraphIssueKind,
    pub skill_ids: Vec<String>,
}

impl std::fmt::Display for GraphIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.kind.as_str(), self.skill_ids.join(", "))
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid skill graph: {}", format_issues(.0))]
    InvalidGraph(Vec<GraphIssue>),

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("unsupported state schema version {found} (expected {expected})")]
    SchemaVersion { found: u32, expected: u32 },

    #[error("state serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

fn format_issues(issues: &[GraphIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
