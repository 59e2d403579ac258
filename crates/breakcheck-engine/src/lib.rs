//! breakcheck engine - breaking change detection
//!
//! This crate implements the analysis itself:
//! - Schema diff between two revisions of a model
//! - Orchestration over version control, extractor and dependency graph
//! - Single-model impact lookup

pub mod analyzer;
pub mod schema_diff;

pub use analyzer::{
    model_impact, AnalysisOutcome, AnalyzeError, ChangeAnalyzer, ModelImpact, MANIFEST_SUBJECT,
};
pub use schema_diff::SchemaDiff;
