//! dbt manifest.json parsing
//!
//! Reads the subset of `target/manifest.json` needed to place models in the
//! dependency graph. Only nodes with `resource_type == "model"` are kept;
//! tests, seeds and snapshots never become graph vertices themselves, although
//! they may still appear as dependency ids.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// dbt manifest.json structure (subset of fields we care about)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Metadata about the manifest
    #[serde(default)]
    pub metadata: ManifestMetadata,

    /// Model, test, seed and snapshot nodes
    #[serde(default)]
    pub nodes: BTreeMap<String, ManifestNode>,
}

impl Manifest {
    /// Load manifest from file
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ManifestError::NotFound(path.to_path_buf())
            } else {
                ManifestError::IoError(path.display().to_string(), e.to_string())
            }
        })?;

        Self::from_json(&contents)
    }

    /// Parse manifest from JSON string
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(json).map_err(|e| ManifestError::ParseError(e.to_string()))
    }

    /// Model nodes converted to graph nodes, keyed by unique id
    pub fn model_nodes(&self) -> BTreeMap<String, Node> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.resource_type == "model")
            .map(|(key, node)| {
                let id = if node.unique_id.is_empty() {
                    key.clone()
                } else {
                    node.unique_id.clone()
                };
                (id.clone(), node.to_node(id))
            })
            .collect()
    }
}

/// Manifest metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    #[serde(default)]
    pub dbt_schema_version: String,
    #[serde(default)]
    pub dbt_version: String,
    #[serde(default)]
    pub generated_at: String,
}

/// A node in the manifest (model, test, snapshot, etc.)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestNode {
    /// Unique identifier (e.g., "model.my_project.users"); falls back to the map key
    #[serde(default)]
    pub unique_id: String,

    /// Node name (e.g., "users")
    #[serde(default)]
    pub name: String,

    /// Resource type (model, test, snapshot, etc.)
    #[serde(default)]
    pub resource_type: String,

    /// Path of the definition file relative to the project root
    #[serde(default)]
    pub original_file_path: Option<String>,

    /// Dependencies
    #[serde(default)]
    pub depends_on: DependsOn,
}

impl ManifestNode {
    fn to_node(&self, id: String) -> Node {
        Node {
            id,
            depends_on: self.depends_on.nodes.clone(),
            name: (!self.name.is_empty()).then(|| self.name.clone()),
            resource_type: (!self.resource_type.is_empty()).then(|| self.resource_type.clone()),
            file_path: self.original_file_path.clone(),
        }
    }
}

/// Dependencies structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependsOn {
    /// List of node unique_ids this node depends on
    #[serde(default)]
    pub nodes: Vec<String>,
}

/// One model as seen by the dependency graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,

    /// Ids of the nodes this one reads from
    pub depends_on: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,

    /// Definition file, used to map changed files back to graph vertices
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

impl Node {
    pub fn new(id: impl Into<String>, depends_on: Vec<String>) -> Self {
        Self {
            id: id.into(),
            depends_on,
            name: None,
            resource_type: None,
            file_path: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }
}

/// Supplies the node set of a project
pub trait NodeSource {
    /// Load every model node, keyed by id
    fn load_nodes(&self) -> Result<BTreeMap<String, Node>, ManifestError>;
}

/// Node source backed by a manifest.json on disk
#[derive(Debug, Clone)]
pub struct ManifestFile {
    path: PathBuf,
}

impl ManifestFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The conventional location inside a dbt project
    pub fn in_project(project_dir: &Path) -> Self {
        Self::new(project_dir.join("target").join("manifest.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NodeSource for ManifestFile {
    fn load_nodes(&self) -> Result<BTreeMap<String, Node>, ManifestError> {
        let manifest = Manifest::from_file(&self.path)?;
        let nodes = manifest.model_nodes();
        tracing::debug!(
            path = %self.path.display(),
            models = nodes.len(),
            "loaded manifest"
        );
        Ok(nodes)
    }
}

/// Fixed node set, for tests and dry runs
#[derive(Debug, Clone, Default)]
pub struct InMemoryNodes {
    nodes: BTreeMap<String, Node>,
}

impl InMemoryNodes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node
    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.insert(node.id.clone(), node);
        self
    }
}

impl FromIterator<Node> for InMemoryNodes {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        Self {
            nodes: iter.into_iter().map(|node| (node.id.clone(), node)).collect(),
        }
    }
}

impl NodeSource for InMemoryNodes {
    fn load_nodes(&self) -> Result<BTreeMap<String, Node>, ManifestError> {
        Ok(self.nodes.clone())
    }
}

/// Manifest loading errors
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Manifest not found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read manifest file {0}: {1}")]
    IoError(String, String),

    #[error("Failed to parse manifest JSON: {0}")]
    ParseError(String),
}
