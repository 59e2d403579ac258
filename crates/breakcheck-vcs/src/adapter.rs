//! Version control trait

use std::path::{Path, PathBuf};

/// Errors raised while accessing a repository
///
/// Any of these aborts the analysis: without the list of changed files there
/// is nothing to compare.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    #[error("Not a git repository: {}", path.display())]
    NotARepository {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    #[error("Repository at {} has no working tree", .0.display())]
    BareRepository(PathBuf),

    #[error("Base revision '{revision}' not found")]
    RevisionNotFound {
        revision: String,
        #[source]
        source: git2::Error,
    },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Repository unavailable: {0}")]
    Unavailable(String),
}

/// Access to the two revisions being compared
pub trait VersionControl {
    /// Short name for logs (e.g. "git")
    fn name(&self) -> &'static str;

    /// Model definition files that differ between base and head
    ///
    /// Paths are relative to the repository root, in a stable order.
    fn list_changed_files(&self) -> Result<Vec<String>, VcsError>;

    /// File contents at the base revision; a file absent there reads as ""
    fn read_at_base(&self, path: &str) -> Result<String, VcsError>;

    /// File contents at the head; a deleted file reads as ""
    fn read_at_head(&self, path: &str) -> Result<String, VcsError>;
}

/// Whether `path` ends in one of `extensions` (case-insensitive, no dot)
pub fn has_extension(path: &str, extensions: &[String]) -> bool {
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}
