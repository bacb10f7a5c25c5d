//! Finds local clones that no longer correspond to any descriptor
//! enumerated in the current run.

use std::collections::BTreeSet;
use std::path::Path;
use walkdir::WalkDir;

/// Walks `target_root` looking for `.git` directories; any clone whose
/// `owner/name` path is not in `known` is reported as archived.
///
/// Never descends into `.git` itself. Individual walk errors (permission
/// denied, broken symlinks) are skipped rather than aborting the scan.
/// Returns an empty set if `target_root` does not exist.
pub fn scan(target_root: &Path, known: &BTreeSet<String>) -> BTreeSet<String> {
    let mut archived = BTreeSet::new();

    if !target_root.exists() {
        return archived;
    }

    let walker = WalkDir::new(target_root)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".git");

    for entry in walker {
        let Ok(entry) = entry else {
            continue;
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let git_dir = entry.path().join(".git");
        if !git_dir.is_dir() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(target_root) else {
            continue;
        };
        let full_name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if !known.contains(&full_name) {
            archived.insert(full_name);
        }
    }

    archived
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_clone(root: &Path, owner: &str, name: &str) {
        let dir = root.join(owner).join(name);
        std::fs::create_dir_all(dir.join(".git")).unwrap();
    }

    #[test]
    fn finds_clones_with_no_counterpart() {
        let tmp = tempfile::tempdir().unwrap();
        make_clone(tmp.path(), "alice", "gone");
        make_clone(tmp.path(), "alice", "present");

        let mut known = BTreeSet::new();
        known.insert("alice/present".to_string());

        let archived = scan(tmp.path(), &known);
        assert_eq!(archived.len(), 1);
        assert!(archived.contains("alice/gone"));
    }

    #[test]
    fn missing_target_root_yields_empty_set() {
        let archived = scan(Path::new("/nonexistent/does/not/exist"), &BTreeSet::new());
        assert!(archived.is_empty());
    }

    #[test]
    fn does_not_descend_into_git_directory() {
        let tmp = tempfile::tempdir().unwrap();
        make_clone(tmp.path(), "alice", "present");
        // plant a directory inside .git that itself looks like a clone;
        // it must never be reported.
        std::fs::create_dir_all(tmp.path().join("alice").join("present").join(".git").join("modules").join(".git")).unwrap();

        let mut known = BTreeSet::new();
        known.insert("alice/present".to_string());

        let archived = scan(tmp.path(), &known);
        assert!(archived.is_empty());
    }

    #[test]
    fn git_file_is_not_treated_as_a_clone() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("alice").join("worktree");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(".git"), "gitdir: ../elsewhere").unwrap();

        let archived = scan(tmp.path(), &BTreeSet::new());
        assert!(archived.is_empty());
    }
}
