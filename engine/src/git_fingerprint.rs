use std::path::Path;

use git2::Repository;

/// Discovers the git worktree (if any) containing `start` and fingerprints
/// it: the current `HEAD` commit id, suffixed with `-dirty` if the
/// worktree has uncommitted changes. Returns `None` when `start` is not
/// inside a git worktree at all (spec.md §4.4 step 5).
pub fn fingerprint_for(start: &Path) -> Option<String> {
    let repo = Repository::discover(start).ok()?;
    let commit = repo.head().ok()?.target()?.to_string();
    if is_dirty(&repo) {
        Some(format!("{commit}-dirty"))
    } else {
        Some(commit)
    }
}

fn is_dirty(repo: &Repository) -> bool {
    let mut opts = git2::StatusOptions::new();
    opts.include_untracked(true).recurse_untracked_dirs(false);
    match repo.statuses(Some(&mut opts)) {
        Ok(statuses) => !statuses.is_empty(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_git_dir_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(fingerprint_for(dir.path()).is_none());
    }

    #[test]
    fn clean_worktree_fingerprints_to_head_commit() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        std::fs::write(dir.path().join("a.md"), "hello\n").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("a.md")).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = git2::Signature::now("tester", "tester@example.com").unwrap();
        let commit_id = repo
            .commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
            .unwrap();

        let fp = fingerprint_for(dir.path()).unwrap();
        assert_eq!(fp, commit_id.to_string());
    }

    #[test]
    fn dirty_worktree_suffixes_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        std::fs::write(dir.path().join("a.md"), "hello\n").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("a.md")).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = git2::Signature::now("tester", "tester@example.com").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[]).unwrap();

        std::fs::write(dir.path().join("a.md"), "changed\n").unwrap();
        let fp = fingerprint_for(dir.path()).unwrap();
        assert!(fp.ends_with("-dirty"));
    }
}
