//! Local git checkout as the change source
//!
//! The base side is a committed revision (by default `origin/main`). The head
//! side is the working tree as it is on disk, so staged, unstaged and
//! untracked edits are all part of the comparison.

use git2::{Delta, DiffOptions, ErrorCode, Repository, Tree};
use std::path::{Path, PathBuf};

use crate::adapter::{has_extension, VcsError, VersionControl};

/// Default revision the working tree is compared against
pub const DEFAULT_BASE_REF: &str = "origin/main";

/// A git repository compared against a base revision
pub struct GitRepository {
    repo: Repository,
    workdir: PathBuf,
    base_ref: String,
    extensions: Vec<String>,
}

impl GitRepository {
    /// Open the repository containing `path`
    pub fn discover(path: &Path) -> Result<Self, VcsError> {
        let repo = Repository::discover(path).map_err(|source| VcsError::NotARepository {
            path: path.to_path_buf(),
            source,
        })?;

        let workdir = repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| VcsError::BareRepository(repo.path().to_path_buf()))?;

        tracing::debug!(workdir = %workdir.display(), "opened git repository");

        Ok(Self {
            repo,
            workdir,
            base_ref: DEFAULT_BASE_REF.to_string(),
            extensions: vec!["sql".to_string()],
        })
    }

    /// Compare against a different base revision (branch, tag or sha)
    pub fn with_base_ref(mut self, base_ref: impl Into<String>) -> Self {
        self.base_ref = base_ref.into();
        self
    }

    /// File extensions that count as model definitions
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn base_ref(&self) -> &str {
        &self.base_ref
    }

    /// Root of the working tree
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn base_tree(&self) -> Result<Tree<'_>, VcsError> {
        let object = self
            .repo
            .revparse_single(&self.base_ref)
            .map_err(|source| VcsError::RevisionNotFound {
                revision: self.base_ref.clone(),
                source,
            })?;

        Ok(object.peel_to_tree()?)
    }
}

impl VersionControl for GitRepository {
    fn name(&self) -> &'static str {
        "git"
    }

    fn list_changed_files(&self) -> Result<Vec<String>, VcsError> {
        let tree = self.base_tree()?;

        let mut options = DiffOptions::new();
        options.include_untracked(true).recurse_untracked_dirs(true);

        let diff = self
            .repo
            .diff_tree_to_workdir_with_index(Some(&tree), Some(&mut options))?;

        let mut files: Vec<String> = Vec::new();
        for delta in diff.deltas() {
            if matches!(delta.status(), Delta::Unmodified | Delta::Ignored) {
                continue;
            }

            let path = delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .and_then(Path::to_str);

            if let Some(path) = path {
                if has_extension(path, &self.extensions) && !files.iter().any(|f| f == path) {
                    files.push(path.to_string());
                }
            }
        }

        tracing::debug!(
            base = %self.base_ref,
            changed = files.len(),
            "listed changed model files"
        );

        Ok(files)
    }

    fn read_at_base(&self, path: &str) -> Result<String, VcsError> {
        let tree = self.base_tree()?;

        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(err) if err.code() == ErrorCode::NotFound => return Ok(String::new()),
            Err(err) => return Err(err.into()),
        };

        let blob = entry.to_object(&self.repo)?.peel_to_blob()?;
        Ok(String::from_utf8_lossy(blob.content()).into_owned())
    }

    fn read_at_head(&self, path: &str) -> Result<String, VcsError> {
        let full_path = self.workdir.join(path);

        match std::fs::read(&full_path) {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(source) => Err(VcsError::Io {
                path: full_path,
                source,
            }),
        }
    }
}
