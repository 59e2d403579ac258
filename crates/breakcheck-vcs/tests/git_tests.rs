//! Git backend tests against throwaway repositories

use breakcheck_vcs::{GitRepository, VcsError, VersionControl};
use git2::{Commit, IndexAddOption, Oid, Repository, Signature};
use pretty_assertions::assert_eq;
use std::path::Path;

fn write(root: &Path, path: &str, contents: &str) {
    let full = root.join(path);
    std::fs::create_dir_all(full.parent().unwrap()).unwrap();
    std::fs::write(full, contents).unwrap();
}

fn commit_all(repo: &Repository, message: &str) -> Oid {
    let mut index = repo.index().unwrap();
    index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None).unwrap();
    index.write().unwrap();

    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let signature = Signature::now("Test", "test@example.com").unwrap();

    let parents: Vec<Commit> = match repo.head() {
        Ok(head) => vec![head.peel_to_commit().unwrap()],
        Err(_) => Vec::new(),
    };
    let parent_refs: Vec<&Commit> = parents.iter().collect();

    repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parent_refs)
        .unwrap()
}

/// Repository whose `origin/main` holds three models and a README
fn project_with_base() -> (tempfile::TempDir, Repository) {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();

    write(dir.path(), "models/a.sql", "select id, name from users");
    write(dir.path(), "models/b.sql", "select id from orders");
    write(dir.path(), "models/c.sql", "select id from payments");
    write(dir.path(), "README.md", "# project");

    let base = commit_all(&repo, "base");
    repo.reference("refs/remotes/origin/main", base, true, "test base")
        .unwrap();

    (dir, repo)
}

#[test]
fn lists_modified_deleted_and_untracked_models() {
    let (dir, _repo) = project_with_base();

    write(dir.path(), "models/a.sql", "select id from users");
    std::fs::remove_file(dir.path().join("models/b.sql")).unwrap();
    write(dir.path(), "models/marts/d.sql", "select id from a");
    write(dir.path(), "README.md", "# changed");

    let git = GitRepository::discover(dir.path()).unwrap();
    let changed = git.list_changed_files().unwrap();

    assert_eq!(
        changed,
        vec!["models/a.sql", "models/b.sql", "models/marts/d.sql"]
    );
}

#[test]
fn reads_base_and_head_contents() {
    let (dir, _repo) = project_with_base();

    write(dir.path(), "models/a.sql", "select id from users");
    std::fs::remove_file(dir.path().join("models/b.sql")).unwrap();
    write(dir.path(), "models/d.sql", "select id from a");

    let git = GitRepository::discover(dir.path()).unwrap();

    assert_eq!(git.read_at_base("models/a.sql").unwrap(), "select id, name from users");
    assert_eq!(git.read_at_head("models/a.sql").unwrap(), "select id from users");

    // deleted at head, added at head
    assert_eq!(git.read_at_head("models/b.sql").unwrap(), "");
    assert_eq!(git.read_at_base("models/d.sql").unwrap(), "");
}

#[test]
fn committed_changes_on_branch_are_listed() {
    let (dir, repo) = project_with_base();

    write(dir.path(), "models/c.sql", "select id, amount from payments");
    commit_all(&repo, "feature");

    let git = GitRepository::discover(dir.path()).unwrap();
    assert_eq!(git.list_changed_files().unwrap(), vec!["models/c.sql"]);
    assert_eq!(git.read_at_base("models/c.sql").unwrap(), "select id from payments");
}

#[test]
fn clean_tree_has_no_changes() {
    let (dir, _repo) = project_with_base();

    let git = GitRepository::discover(dir.path()).unwrap();
    assert!(git.list_changed_files().unwrap().is_empty());
}

#[test]
fn discovers_from_subdirectory() {
    let (dir, _repo) = project_with_base();
    write(dir.path(), "models/a.sql", "select 1 as id");

    let git = GitRepository::discover(&dir.path().join("models")).unwrap();
    assert_eq!(git.list_changed_files().unwrap(), vec!["models/a.sql"]);
}

#[test]
fn custom_base_ref() {
    let (dir, _repo) = project_with_base();
    write(dir.path(), "models/a.sql", "select 1 as id");

    let git = GitRepository::discover(dir.path()).unwrap().with_base_ref("HEAD");
    assert_eq!(git.base_ref(), "HEAD");
    assert_eq!(git.list_changed_files().unwrap(), vec!["models/a.sql"]);
}

#[test]
fn unknown_base_ref_is_an_error() {
    let (dir, _repo) = project_with_base();

    let git = GitRepository::discover(dir.path())
        .unwrap()
        .with_base_ref("origin/does-not-exist");

    match git.list_changed_files() {
        Err(VcsError::RevisionNotFound { revision, .. }) => {
            assert_eq!(revision, "origin/does-not-exist")
        }
        other => panic!("expected RevisionNotFound, got {:?}", other),
    }
}

#[test]
fn extension_filter_is_configurable() {
    let (dir, _repo) = project_with_base();
    write(dir.path(), "models/a.sql", "select 1 as id");
    write(dir.path(), "models/schema.yml", "version: 2");

    let git = GitRepository::discover(dir.path())
        .unwrap()
        .with_extensions(vec!["yml".to_string()]);

    assert_eq!(git.list_changed_files().unwrap(), vec!["models/schema.yml"]);
}
