//! In-memory version control for testing
//!
//! Holds two snapshots of file contents, base and head, and reports every
//! path whose contents differ. Useful for:
//! - Unit testing the analyzer without a git checkout
//! - Dry runs over hand-written model revisions
//! - Simulating an inaccessible repository

use std::collections::{BTreeMap, BTreeSet};

use crate::adapter::{has_extension, VcsError, VersionControl};

/// Fixed base and head snapshots
#[derive(Debug, Clone)]
pub struct InMemoryRepository {
    base: BTreeMap<String, String>,
    head: BTreeMap<String, String>,
    extensions: Vec<String>,

    /// Simulate a repository that cannot be read
    unavailable: Option<String>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            base: BTreeMap::new(),
            head: BTreeMap::new(),
            extensions: vec!["sql".to_string()],
            unavailable: None,
        }
    }

    /// Set a file's contents at the base revision
    pub fn with_base(mut self, path: impl Into<String>, contents: impl Into<String>) -> Self {
        self.base.insert(path.into(), contents.into());
        self
    }

    /// Set a file's contents at the head
    pub fn with_head(mut self, path: impl Into<String>, contents: impl Into<String>) -> Self {
        self.head.insert(path.into(), contents.into());
        self
    }

    /// Same file, old and new contents
    pub fn with_change(
        self,
        path: impl Into<String>,
        base: impl Into<String>,
        head: impl Into<String>,
    ) -> Self {
        let path = path.into();
        self.with_base(path.clone(), base).with_head(path, head)
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    /// Make every call fail with the given reason
    pub fn unavailable(mut self, reason: impl Into<String>) -> Self {
        self.unavailable = Some(reason.into());
        self
    }

    fn check_available(&self) -> Result<(), VcsError> {
        match &self.unavailable {
            Some(reason) => Err(VcsError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionControl for InMemoryRepository {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    fn list_changed_files(&self) -> Result<Vec<String>, VcsError> {
        self.check_available()?;

        let paths: BTreeSet<&String> = self.base.keys().chain(self.head.keys()).collect();

        Ok(paths
            .into_iter()
            .filter(|path| has_extension(path, &self.extensions))
            .filter(|path| self.base.get(*path) != self.head.get(*path))
            .cloned()
            .collect())
    }

    fn read_at_base(&self, path: &str) -> Result<String, VcsError> {
        self.check_available()?;
        Ok(self.base.get(path).cloned().unwrap_or_default())
    }

    fn read_at_head(&self, path: &str) -> Result<String, VcsError> {
        self.check_available()?;
        Ok(self.head.get(path).cloned().unwrap_or_default())
    }
}
