//! Report schema
//!
//! `breaking_changes` keeps the shape CI consumers already parse:
//! `[{file_path, change_type, details}]`. Everything else is additive.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::change::{ChangeKind, ChangeRecord};
use crate::warning::AnalysisWarning;

/// Summary statistics for a report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Total number of breaking changes
    pub total: usize,

    /// Breaking changes per change type
    pub by_type: BTreeMap<ChangeKind, usize>,

    /// Number of warnings
    pub warnings: usize,

    /// Number of changed model files that were diffed
    pub files_analyzed: usize,

    /// Whether the dependency graph was available
    pub graph_analyzed: bool,
}

/// Result of one analysis run, ready for rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// All breaking changes: file diffs first, then cycles
    pub breaking_changes: Vec<ChangeRecord>,

    /// Files or stages that could not be analyzed
    #[serde(default)]
    pub warnings: Vec<AnalysisWarning>,

    #[serde(default)]
    pub summary: ReportSummary,

    /// Timestamp (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
}

impl Report {
    /// Create a report from analysis results
    pub fn new(
        breaking_changes: Vec<ChangeRecord>,
        warnings: Vec<AnalysisWarning>,
        files_analyzed: usize,
        graph_analyzed: bool,
    ) -> Self {
        let mut by_type = BTreeMap::new();
        for change in &breaking_changes {
            *by_type.entry(change.kind()).or_insert(0) += 1;
        }

        let summary = ReportSummary {
            total: breaking_changes.len(),
            by_type,
            warnings: warnings.len(),
            files_analyzed,
            graph_analyzed,
        };

        Self {
            breaking_changes,
            warnings,
            summary,
            generated_at: Some(chrono::Utc::now().to_rfc3339()),
        }
    }

    pub fn has_breaking_changes(&self) -> bool {
        !self.breaking_changes.is_empty()
    }

    /// Breaking changes grouped by type, in first-seen order
    pub fn grouped_by_kind(&self) -> Vec<(ChangeKind, Vec<&ChangeRecord>)> {
        let mut groups: Vec<(ChangeKind, Vec<&ChangeRecord>)> = Vec::new();
        for change in &self.breaking_changes {
            match groups.iter_mut().find(|(kind, _)| *kind == change.kind()) {
                Some((_, members)) => members.push(change),
                None => groups.push((change.kind(), vec![change])),
            }
        }
        groups
    }

    /// Union of `affected_models` over all changes, sorted
    pub fn affected_models(&self) -> Vec<String> {
        let mut models: Vec<String> = self
            .breaking_changes
            .iter()
            .flat_map(|c| c.details().affected_models().iter().cloned())
            .collect();
        models.sort();
        models.dedup();
        models
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

impl Default for Report {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new(), 0, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warning::WarningKind;
    use pretty_assertions::assert_eq;

    fn sample_changes() -> Vec<ChangeRecord> {
        vec![
            ChangeRecord::column_removed("models/a.sql", vec!["x".into()], vec!["model.p.c".into()]),
            ChangeRecord::cyclic_dependency(vec!["a".into(), "b".into()]),
            ChangeRecord::column_removed("models/b.sql", vec!["y".into()], vec!["model.p.c".into(), "model.p.d".into()]),
        ]
    }

    #[test]
    fn empty_report() {
        let report = Report::default();
        assert_eq!(report.summary.total, 0);
        assert!(!report.has_breaking_changes());

        let json = report.to_json().unwrap();
        assert!(json.contains("\"breaking_changes\": []"));
    }

    #[test]
    fn summary_counts_by_type() {
        let warnings = vec![AnalysisWarning::new("models/c.sql", WarningKind::ParseFailure, "bad")];
        let report = Report::new(sample_changes(), warnings, 3, true);

        assert_eq!(report.summary.total, 3);
        assert_eq!(report.summary.warnings, 1);
        assert_eq!(report.summary.by_type.get(&ChangeKind::ColumnRemoved), Some(&2));
        assert_eq!(report.summary.by_type.get(&ChangeKind::CyclicDependency), Some(&1));
    }

    #[test]
    fn grouping_keeps_first_seen_order() {
        let report = Report::new(sample_changes(), Vec::new(), 2, true);
        let groups = report.grouped_by_kind();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, ChangeKind::ColumnRemoved);
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, ChangeKind::CyclicDependency);
    }

    #[test]
    fn affected_models_are_deduplicated() {
        let report = Report::new(sample_changes(), Vec::new(), 2, true);
        assert_eq!(
            report.affected_models(),
            vec!["model.p.c".to_string(), "model.p.d".to_string()]
        );
    }

    #[test]
    fn json_shape_has_breaking_changes_list() {
        let report = Report::new(sample_changes(), Vec::new(), 2, true);
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        let first = &value["breaking_changes"][0];
        assert_eq!(first["file_path"], "models/a.sql");
        assert_eq!(first["change_type"], "column_removed");
        assert_eq!(first["details"]["columns"][0], "x");
    }
}
