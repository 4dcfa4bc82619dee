//! On-disk checkpoint storage
//!
//! All checkpoints for a repository live under one reserved top-level
//! directory, `.checkpoints`, with one subdirectory per checkpoint named by
//! the checkpoint's own name. Each subdirectory mirrors the relative path
//! structure of the captured files plus the reserved `meta.json` at its
//! root. The storage area excludes itself from every file enumeration and
//! is never deleted by a restore.

use crate::checkpoint::{self, CheckpointMeta, CheckpointStats, META_FILE_NAME};
use crate::error::{CkptError, Result};
use crate::repo;
use crate::restore::{self, RestoreResult};
use crate::utils;
use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Reserved top-level directory holding all checkpoints for a repository
pub const STORAGE_DIR_NAME: &str = ".checkpoints";

/// Whether a repository-relative path falls under the storage area
pub fn is_storage_path(rel: &str) -> bool {
    match rel.strip_prefix(STORAGE_DIR_NAME) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Manages the checkpoint storage area of one repository
///
/// Holds no state beyond the two paths; every operation reads the
/// filesystem fresh.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    root: PathBuf,
    storage_root: PathBuf,
}

impl CheckpointStore {
    /// Create a store for the repository rooted at `root`. Nothing is
    /// touched on disk until an operation runs.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let storage_root = root.join(STORAGE_DIR_NAME);
        Self { root, storage_root }
    }

    /// Repository root this store operates on
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The storage area directory (may not exist yet)
    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Directory a checkpoint of the given name occupies
    pub fn checkpoint_dir(&self, name: &str) -> PathBuf {
        self.storage_root.join(name)
    }

    /// Whether a checkpoint of the given name exists
    pub fn exists(&self, name: &str) -> bool {
        self.checkpoint_dir(name).is_dir()
    }

    /// Capture the repository's current file set as a checkpoint.
    ///
    /// Fails with [`CkptError::AlreadyExists`] on a name collision unless
    /// `force` is set, in which case the existing checkpoint is removed
    /// recursively first. Metadata is written last, so a checkpoint without
    /// `meta.json` is a capture that never finished.
    ///
    /// Returns the written metadata and the number of captured entries.
    pub fn push(&self, name: &str, force: bool) -> Result<(CheckpointMeta, usize)> {
        checkpoint::validate_name(name)?;

        let dir = self.checkpoint_dir(name);
        if dir.exists() {
            if !force {
                return Err(CkptError::AlreadyExists(name.to_string()));
            }
            info!("overwriting existing checkpoint '{}'", name);
            fs::remove_dir_all(&dir).map_err(|e| CkptError::io("remove checkpoint", &dir, e))?;
        }

        let files = repo::list_repo_files(&self.root)?;

        fs::create_dir_all(&dir).map_err(|e| CkptError::io("create checkpoint", &dir, e))?;

        for rel in &files {
            utils::copy_entry(&self.root.join(rel), &dir.join(rel))?;
        }

        let meta = CheckpointMeta::new(name);
        checkpoint::write_meta(&dir, &meta)?;

        debug!("captured {} entries into checkpoint '{}'", files.len(), name);
        Ok((meta, files.len()))
    }

    /// Restore the named checkpoint onto the live tree.
    ///
    /// Destructive: files not in the checkpoint are deleted and directories
    /// they leave empty are pruned. See the [`restore`](crate::restore)
    /// module for the phase ordering and its guarantees.
    pub fn restore(&self, name: &str) -> Result<RestoreResult> {
        checkpoint::validate_name(name)?;

        let dir = self.checkpoint_dir(name);
        if !dir.is_dir() {
            return Err(CkptError::CheckpointNotFound(name.to_string()));
        }

        let checkpoint_files = self.checkpoint_files(name)?;
        let live_files = repo::list_repo_files(&self.root)?;

        info!(
            "restoring checkpoint '{}' ({} entries) over {} live files",
            name,
            checkpoint_files.len(),
            live_files.len()
        );
        restore::restore_tree(&self.root, &dir, &checkpoint_files, &live_files)
    }

    /// The sorted file set stored inside a checkpoint.
    ///
    /// Walks the checkpoint directory without following symlinks, yielding
    /// every regular file and symlink relative to the checkpoint root. The
    /// reserved metadata file is excluded; directories are implied by the
    /// paths and not listed.
    pub fn checkpoint_files(&self, name: &str) -> Result<Vec<String>> {
        let dir = self.checkpoint_dir(name);
        let mut files = Vec::new();

        for entry in WalkDir::new(&dir).follow_links(false) {
            let entry = entry?;
            if entry.file_type().is_dir() {
                continue;
            }
            // Walkdir only yields paths under its root
            let Ok(rel) = entry.path().strip_prefix(&dir) else {
                continue;
            };
            let rel = rel
                .to_str()
                .ok_or_else(|| CkptError::PathEncoding(rel.as_os_str().to_os_string()))?;
            if rel == META_FILE_NAME {
                continue;
            }
            files.push(rel.to_string());
        }

        files.sort();
        Ok(files)
    }

    /// Metadata for every checkpoint in the storage area, in directory
    /// read order.
    ///
    /// A checkpoint whose metadata is missing or corrupt is not dropped:
    /// its directory name and last-modified time stand in, so one bad
    /// `meta.json` cannot hide a snapshot from the listing. Entries whose
    /// modification time cannot be read either are skipped.
    pub fn list(&self) -> Result<Vec<CheckpointMeta>> {
        let entries = match fs::read_dir(&self.storage_root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CkptError::io("read storage area", &self.storage_root, e)),
        };

        let mut metas = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| CkptError::io("read storage area", &self.storage_root, e))?;
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            if let Some(meta) = self.meta_or_fallback(&entry) {
                metas.push(meta);
            }
        }
        Ok(metas)
    }

    /// Read a checkpoint's metadata, synthesizing a best-effort substitute
    /// from the directory itself when the file is missing or malformed.
    fn meta_or_fallback(&self, entry: &fs::DirEntry) -> Option<CheckpointMeta> {
        let name = entry.file_name().to_string_lossy().into_owned();
        match checkpoint::read_meta(&entry.path()) {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!("metadata unreadable for '{}', using directory mtime: {}", name, e);
                let modified = entry.metadata().ok()?.modified().ok()?;
                Some(CheckpointMeta {
                    name,
                    created_at: DateTime::<Utc>::from(modified),
                })
            }
        }
    }

    /// Name of the most recently created checkpoint.
    ///
    /// Uses the same metadata fallback as [`list`](Self::list). Ties are
    /// broken deterministically by the stable enumeration order.
    pub fn latest_name(&self) -> Result<String> {
        let mut metas = self.list()?;
        if metas.is_empty() {
            return Err(CkptError::NoCheckpoints);
        }
        metas.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(metas.remove(0).name)
    }

    /// File and line counts for a checkpoint, for display only.
    ///
    /// Symlinked entries count toward `file_count` but are not opened for
    /// line counting, so a dangling link cannot fail the listing.
    pub fn stats(&self, name: &str) -> Result<CheckpointStats> {
        let dir = self.checkpoint_dir(name);
        let files = self.checkpoint_files(name)?;

        let mut stats = CheckpointStats {
            file_count: files.len(),
            line_count: 0,
        };
        for rel in &files {
            let path = dir.join(rel);
            let meta = fs::symlink_metadata(&path).map_err(|e| CkptError::io("stat", &path, e))?;
            if meta.file_type().is_symlink() {
                continue;
            }
            stats.line_count += checkpoint::count_lines(&path)?;
        }
        Ok(stats)
    }

    /// Remove the entire storage area and every checkpoint in it.
    ///
    /// Returns `false` when there was nothing to delete.
    pub fn nuke(&self) -> Result<bool> {
        match fs::remove_dir_all(&self.storage_root) {
            Ok(()) => {
                info!("removed storage area {:?}", self.storage_root);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CkptError::io("remove storage area", &self.storage_root, e)),
        }
    }
}
