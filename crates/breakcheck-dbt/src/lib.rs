//! dbt artifact parsing and DAG construction
//!
//! This crate handles:
//! - Parsing manifest.json (dbt-generated artifacts) into graph nodes
//! - Building the model dependency graph
//! - Cycle detection and impact analysis (downstream dependencies)

pub mod dag;
pub mod manifest;

pub use dag::{DependencyGraph, NodeId};
pub use manifest::{
    DependsOn, InMemoryNodes, Manifest, ManifestError, ManifestFile, ManifestMetadata,
    ManifestNode, Node, NodeSource,
};
