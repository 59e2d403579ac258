//! Structural schema of a model's output

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Output shape of one model at one revision
///
/// Columns are a set: order in the SQL text is not significant, and names are
/// kept sorted so diffs and reports come out in the same order every run.
/// Types are best-effort and frequently absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Projected column names
    columns: BTreeSet<String>,

    /// Declared type per column, when the text annotates one
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    types: BTreeMap<String, String>,

    /// Projection contains `*` or `alias.*`
    #[serde(default)]
    wildcard: bool,
}

impl Schema {
    /// Create a new empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a schema from column names
    pub fn from_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            types: BTreeMap::new(),
            wildcard: false,
        }
    }

    /// Add a column (and its type) while building the schema
    pub fn with_typed_column(mut self, name: impl Into<String>, data_type: impl Into<String>) -> Self {
        let name = name.into();
        self.types.insert(name.clone(), data_type.into());
        self.columns.insert(name);
        self
    }

    /// Mark the projection as containing a wildcard
    pub fn with_wildcard(mut self, wildcard: bool) -> Self {
        self.wildcard = wildcard;
        self
    }

    /// Column names, sorted
    pub fn columns(&self) -> &BTreeSet<String> {
        &self.columns
    }

    /// Type of a column, if one was declared
    pub fn column_type(&self, name: &str) -> Option<&str> {
        self.types.get(name).map(String::as_str)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }

    /// Whether the projection contained `*`
    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// True when nothing was projected at all (e.g. the file is absent)
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && !self.wildcard
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }
}
