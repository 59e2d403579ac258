//! Breaking change records
//!
//! The `change_type` strings are part of the JSON report consumed by CI
//! tooling. Never rename them; add new kinds instead.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Subject used for graph-level findings that belong to no single file
pub const PROJECT_STRUCTURE: &str = "project_structure";

/// Closed set of breaking change categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Output columns disappeared from a model
    ColumnRemoved,

    /// An output column's declared type changed
    TypeChanged,

    /// Models depend on each other in a loop
    CyclicDependency,

    /// The output shape changed in a way that cannot be enumerated
    SchemaChanged,
}

impl ChangeKind {
    /// Stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ColumnRemoved => "column_removed",
            Self::TypeChanged => "type_changed",
            Self::CyclicDependency => "cyclic_dependency",
            Self::SchemaChanged => "schema_changed",
        }
    }

    /// Title-cased label for reports ("Column Removed")
    pub fn title(&self) -> &'static str {
        match self {
            Self::ColumnRemoved => "Column Removed",
            Self::TypeChanged => "Type Changed",
            Self::CyclicDependency => "Cyclic Dependency",
            Self::SchemaChanged => "Schema Changed",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Columns removed from one model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRemoval {
    /// Removed column names, sorted
    pub columns: Vec<String>,

    /// Models downstream of the changed model
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected_models: Vec<String>,
}

/// A single column whose type changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeChange {
    pub column: String,
    pub old_type: String,
    pub new_type: String,
}

/// All type changes found in one model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeChanges {
    pub changes: Vec<TypeChange>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected_models: Vec<String>,
}

/// A dependency loop, in edge order starting from its smallest vertex
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyCycle {
    pub cycle: Vec<String>,
}

/// Output shape changed without an enumerable column diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaShift {
    pub summary: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected_models: Vec<String>,
}

/// Kind-specific payload of a change record
///
/// Serialized adjacently tagged so that a record renders as
/// `{"file_path": .., "change_type": .., "details": {..}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change_type", content = "details", rename_all = "snake_case")]
pub enum ChangeDetails {
    ColumnRemoved(ColumnRemoval),
    TypeChanged(TypeChanges),
    CyclicDependency(DependencyCycle),
    SchemaChanged(SchemaShift),
}

impl ChangeDetails {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::ColumnRemoved(_) => ChangeKind::ColumnRemoved,
            Self::TypeChanged(_) => ChangeKind::TypeChanged,
            Self::CyclicDependency(_) => ChangeKind::CyclicDependency,
            Self::SchemaChanged(_) => ChangeKind::SchemaChanged,
        }
    }

    /// Downstream models recorded with the change (empty for cycles)
    pub fn affected_models(&self) -> &[String] {
        match self {
            Self::ColumnRemoved(d) => &d.affected_models,
            Self::TypeChanged(d) => &d.affected_models,
            Self::SchemaChanged(d) => &d.affected_models,
            Self::CyclicDependency(_) => &[],
        }
    }

    /// Key/value lines describing the payload, used by text renderers
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = match self {
            Self::ColumnRemoved(d) => vec![format!("columns: {}", d.columns.join(", "))],
            Self::TypeChanged(d) => d
                .changes
                .iter()
                .map(|c| format!("{}: {} -> {}", c.column, c.old_type, c.new_type))
                .collect(),
            Self::CyclicDependency(d) => {
                let mut path = d.cycle.clone();
                if let Some(first) = d.cycle.first() {
                    path.push(first.clone());
                }
                vec![format!("cycle: {}", path.join(" -> "))]
            }
            Self::SchemaChanged(d) => vec![format!("summary: {}", d.summary)],
        };

        let affected = self.affected_models();
        if !affected.is_empty() {
            lines.push(format!("affected_models: {}", affected.join(", ")));
        }

        lines
    }
}

/// One detected breaking change
///
/// Records are built once and only ever collected; there are no setters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    file_path: String,

    #[serde(flatten)]
    details: ChangeDetails,
}

impl ChangeRecord {
    pub fn new(file_path: impl Into<String>, details: ChangeDetails) -> Self {
        Self {
            file_path: file_path.into(),
            details,
        }
    }

    /// Columns present before and missing now
    pub fn column_removed(
        file_path: impl Into<String>,
        columns: Vec<String>,
        affected_models: Vec<String>,
    ) -> Self {
        Self::new(
            file_path,
            ChangeDetails::ColumnRemoved(ColumnRemoval { columns, affected_models }),
        )
    }

    pub fn type_changed(
        file_path: impl Into<String>,
        changes: Vec<TypeChange>,
        affected_models: Vec<String>,
    ) -> Self {
        Self::new(
            file_path,
            ChangeDetails::TypeChanged(TypeChanges { changes, affected_models }),
        )
    }

    /// A cycle in the project graph, reported against `project_structure`
    pub fn cyclic_dependency(cycle: Vec<String>) -> Self {
        Self::new(
            PROJECT_STRUCTURE,
            ChangeDetails::CyclicDependency(DependencyCycle { cycle }),
        )
    }

    pub fn schema_changed(
        file_path: impl Into<String>,
        summary: impl Into<String>,
        affected_models: Vec<String>,
    ) -> Self {
        Self::new(
            file_path,
            ChangeDetails::SchemaChanged(SchemaShift {
                summary: summary.into(),
                affected_models,
            }),
        )
    }

    /// File path, or `project_structure` for graph findings
    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn kind(&self) -> ChangeKind {
        self.details.kind()
    }

    pub fn details(&self) -> &ChangeDetails {
        &self.details
    }
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Breaking change in {}: {}", self.file_path, self.kind())?;
        for line in self.details.summary_lines() {
            write!(f, "\n  {}", line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn change_kind_strings_are_stable() {
        assert_eq!(ChangeKind::ColumnRemoved.as_str(), "column_removed");
        assert_eq!(ChangeKind::TypeChanged.as_str(), "type_changed");
        assert_eq!(ChangeKind::CyclicDependency.as_str(), "cyclic_dependency");
        assert_eq!(ChangeKind::SchemaChanged.as_str(), "schema_changed");
    }

    #[test]
    fn column_removed_serialization() {
        let record = ChangeRecord::column_removed("models/users.sql", vec!["col2".to_string()], vec![]);

        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "file_path": "models/users.sql",
                "change_type": "column_removed",
                "details": { "columns": ["col2"] }
            })
        );
    }

    #[test]
    fn type_changed_serialization_includes_impact() {
        let record = ChangeRecord::type_changed(
            "models/orders.sql",
            vec![TypeChange {
                column: "amount".to_string(),
                old_type: "INT".to_string(),
                new_type: "VARCHAR".to_string(),
            }],
            vec!["model.shop.revenue".to_string()],
        );

        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "file_path": "models/orders.sql",
                "change_type": "type_changed",
                "details": {
                    "changes": [{ "column": "amount", "old_type": "INT", "new_type": "VARCHAR" }],
                    "affected_models": ["model.shop.revenue"]
                }
            })
        );
    }

    #[test]
    fn cycle_record_uses_project_structure() {
        let record = ChangeRecord::cyclic_dependency(vec!["a".to_string(), "b".to_string()]);

        assert_eq!(record.file_path(), PROJECT_STRUCTURE);
        assert_eq!(record.kind(), ChangeKind::CyclicDependency);
        assert_eq!(record.details().summary_lines(), vec!["cycle: a -> b -> a".to_string()]);
    }

    #[test]
    fn record_deserializes_from_report_shape() {
        let value = json!({
            "file_path": "project_structure",
            "change_type": "cyclic_dependency",
            "details": { "cycle": ["x", "y"] }
        });

        let record: ChangeRecord = serde_json::from_value(value).unwrap();
        assert_eq!(record, ChangeRecord::cyclic_dependency(vec!["x".to_string(), "y".to_string()]));
    }

    #[test]
    fn display_lists_details() {
        let record = ChangeRecord::column_removed(
            "models/a.sql",
            vec!["x".to_string(), "y".to_string()],
            vec![],
        );

        assert_eq!(
            record.to_string(),
            "Breaking change in models/a.sql: column_removed\n  columns: x, y"
        );
    }
}
