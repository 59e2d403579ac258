//! Non-breaking findings: things the run could not analyze

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why part of the analysis was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A model file could not be tokenized
    ParseFailure,

    /// The manifest was unavailable, so cycles and impact were not computed
    GraphSkipped,

    /// The file matched a skip pattern in the config
    Skipped,

    /// The time budget ran out before every file was analyzed
    TimeBudgetExceeded,
}

impl WarningKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ParseFailure => "parse_failure",
            Self::GraphSkipped => "graph_skipped",
            Self::Skipped => "skipped",
            Self::TimeBudgetExceeded => "time_budget_exceeded",
        }
    }
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A warning-level record, reported separately from breaking changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWarning {
    subject: String,
    kind: WarningKind,
    message: String,
}

impl AnalysisWarning {
    pub fn new(subject: impl Into<String>, kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            kind,
            message: message.into(),
        }
    }

    /// File path or `project_structure`
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn kind(&self) -> WarningKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for AnalysisWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.subject, self.kind, self.message)
    }
}
