//! Version-control access for change analysis
//!
//! The analyzer never talks to git directly. It is handed a
//! [`VersionControl`] implementation that can list changed model files and
//! read any file at the base revision and at the head.
//!
//! - [`GitRepository`]: a local git checkout, compared against a base ref
//! - [`InMemoryRepository`]: fixed file contents for tests and dry runs

pub mod adapter;
pub mod git;
pub mod mock;

pub use adapter::{has_extension, VcsError, VersionControl};
pub use git::GitRepository;
pub use mock::InMemoryRepository;
