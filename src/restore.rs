//! The restore engine
//!
//! Restoring a checkpoint makes the live tree's file set equal to the
//! checkpoint's file set. The engine runs three phases strictly in order,
//! with no rollback on a mid-sequence failure:
//!
//! 1. **Deletion**: every live path absent from the checkpoint is removed,
//!    and each removed path's ancestor directories become prune candidates.
//! 2. **Pruning**: candidate directories are removed deepest-first, but only
//!    when empty, not required by any checkpoint path, and not protected
//!    (the storage area and `.git` are never touched).
//! 3. **Restoration**: every checkpoint entry is copied back onto the live
//!    tree. This phase is additive only.
//!
//! Deletion must precede restoration so a path whose type changed (directory
//! then, file now) cannot collide; pruning must precede restoration so
//! directories the checkpoint is about to recreate are not mistaken for
//! stale clutter; pruning runs deepest-first because a parent cannot be
//! proven empty until its children are resolved.
//!
//! A crash between phases leaves the tree partially restored. That is an
//! accepted risk of the design, not recovered from here.

use crate::error::{CkptError, Result};
use crate::repo::GIT_DIR_NAME;
use crate::store;
use crate::utils;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, trace};

/// Counters reported by a completed restore
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreResult {
    /// Checkpoint entries copied back onto the live tree
    pub files_restored: usize,
    /// Live files deleted because the checkpoint does not contain them
    pub files_deleted: usize,
    /// Directories removed after being emptied by deletion
    pub dirs_pruned: usize,
}

/// Compute the required-directory set of a file set: every ancestor
/// directory of every path, inclusive of intermediate levels. Directories in
/// this set must never be pruned; a surviving or about-to-be-restored file
/// needs them.
pub fn required_dirs(files: &[String]) -> HashSet<String> {
    let mut required = HashSet::new();
    for rel in files {
        collect_ancestors(rel, &mut required);
    }
    required
}

/// Insert every ancestor directory of `rel` ("a/b/c.txt" -> "a/b", "a").
fn collect_ancestors(rel: &str, out: &mut HashSet<String>) {
    let mut current = rel;
    while let Some(idx) = current.rfind('/') {
        current = &current[..idx];
        if !out.insert(current.to_string()) {
            // Ancestors above an already-seen directory are present too
            break;
        }
    }
}

/// Restore the contents of `checkpoint_dir` onto `root`.
///
/// `checkpoint_files` is the checkpoint's sorted file set; `live_files` is
/// the live tree's file set as reported by the enumerator. Both are
/// repository-relative `/`-separated paths.
pub fn restore_tree(
    root: &Path,
    checkpoint_dir: &Path,
    checkpoint_files: &[String],
    live_files: &[String],
) -> Result<RestoreResult> {
    let checkpoint_set: HashSet<&str> = checkpoint_files.iter().map(String::as_str).collect();
    let required = required_dirs(checkpoint_files);

    let mut result = RestoreResult::default();

    // Phase 1: delete live files the checkpoint does not contain
    let mut candidates = HashSet::new();
    for rel in live_files {
        if checkpoint_set.contains(rel.as_str()) {
            continue;
        }
        let path = root.join(rel);
        fs::remove_file(&path).map_err(|e| CkptError::io("remove", &path, e))?;
        trace!("deleted {}", rel);
        result.files_deleted += 1;
        collect_ancestors(rel, &mut candidates);
    }
    debug!(
        "deletion phase removed {} files, {} prune candidates",
        result.files_deleted,
        candidates.len()
    );

    // Phase 2: prune directories emptied by deletion, deepest first
    result.dirs_pruned = prune_empty_dirs(root, candidates, &required)?;

    // Phase 3: copy every checkpoint entry back
    for rel in checkpoint_files {
        let src = checkpoint_dir.join(rel);
        let dst = root.join(rel);
        utils::copy_entry(&src, &dst)?;
        result.files_restored += 1;
    }
    debug!("restored {} files", result.files_restored);

    Ok(result)
}

/// Remove candidate directories that deletion left empty.
///
/// Candidates are filtered against the required set and the permanently
/// protected paths, then processed deepest-first so children are attempted
/// before their parents. Three removal outcomes are expected steady state
/// and silently skipped: the directory is non-empty (a sibling still lives
/// there), permission was denied, or it is already gone. Anything else is a
/// restore failure.
fn prune_empty_dirs(
    root: &Path,
    candidates: HashSet<String>,
    required: &HashSet<String>,
) -> Result<usize> {
    let mut ordered: Vec<String> = candidates
        .into_iter()
        .filter(|dir| !dir.is_empty() && !is_protected(dir))
        .collect();
    ordered.sort_by(|a, b| {
        let depth_a = a.matches('/').count();
        let depth_b = b.matches('/').count();
        depth_b.cmp(&depth_a).then_with(|| a.cmp(b))
    });

    let mut pruned = 0;
    for dir in ordered {
        if required.contains(&dir) {
            continue;
        }
        let path = root.join(&dir);
        match utils::remove_dir_if_empty(&path) {
            Ok(true) => pruned += 1,
            Ok(false) => trace!("kept non-empty directory {}", dir),
            Err(e) if matches!(
                e.kind(),
                io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
            ) =>
            {
                trace!("skipped directory {}: {}", dir, e);
            }
            Err(e) => return Err(CkptError::io("remove directory", &path, e)),
        }
    }
    Ok(pruned)
}

/// Directories no operation may ever delete: the checkpoint storage area and
/// the version-control marker directory.
fn is_protected(rel: &str) -> bool {
    if store::is_storage_path(rel) {
        return true;
    }
    match rel.strip_prefix(GIT_DIR_NAME) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_required_dirs() {
        let files = vec![
            "src/a.txt".to_string(),
            "src/deep/nested/b.txt".to_string(),
            "top.txt".to_string(),
        ];
        let required = required_dirs(&files);
        assert_eq!(required, set(&["src", "src/deep", "src/deep/nested"]));
    }

    #[test]
    fn test_required_dirs_empty() {
        assert!(required_dirs(&[]).is_empty());
    }

    #[test]
    fn test_is_protected() {
        assert!(is_protected(".git"));
        assert!(is_protected(".git/objects"));
        assert!(is_protected(store::STORAGE_DIR_NAME));
        assert!(is_protected(&format!("{}/v1", store::STORAGE_DIR_NAME)));
        assert!(!is_protected(".github"));
        assert!(!is_protected("src"));
    }

    #[test]
    fn test_prune_skips_required_and_protected() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join("stale")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();

        let required = set(&["src"]);
        let candidates = set(&["src", "stale", ".git"]);
        let pruned = prune_empty_dirs(root, candidates, &required).unwrap();

        assert_eq!(pruned, 1);
        assert!(root.join("src").exists());
        assert!(root.join(".git").exists());
        assert!(!root.join("stale").exists());
    }

    #[test]
    fn test_prune_deepest_first() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("a/b/c")).unwrap();

        // The parent only becomes empty once the child is removed
        let candidates = set(&["a", "a/b", "a/b/c"]);
        let pruned = prune_empty_dirs(root, candidates, &HashSet::new()).unwrap();

        assert_eq!(pruned, 3);
        assert!(!root.join("a").exists());
    }

    #[test]
    fn test_prune_keeps_occupied_dirs() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("docs")).unwrap();
        std::fs::write(root.join("docs/survivor.md"), b"still here").unwrap();

        let candidates = set(&["docs"]);
        let pruned = prune_empty_dirs(root, candidates, &HashSet::new()).unwrap();

        assert_eq!(pruned, 0);
        assert!(root.join("docs/survivor.md").exists());
    }

    #[test]
    fn test_prune_tolerates_already_gone() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let candidates = set(&["vanished"]);
        let pruned = prune_empty_dirs(temp_dir.path(), candidates, &HashSet::new()).unwrap();
        assert_eq!(pruned, 0);
    }
}
