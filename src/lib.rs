//! # ckpt - Lightweight working-tree checkpoints for git repositories
//!
//! ckpt snapshots the working tree of a git repository into a sibling
//! directory and later restores it, reproducing the tracked-and-untracked
//! file set exactly as it existed at snapshot time while removing files and
//! directories created afterward.
//!
//! ## Overview
//!
//! A checkpoint is a plain recursive copy of every file git considers part
//! of the project (tracked plus untracked, excluding ignored), stored under
//! `.checkpoints/<name>/` at the repository root next to a small `meta.json`.
//! No hashing, no compression, no deltas: the format is transparent enough
//! to inspect or rescue with ordinary shell tools.
//!
//! Restoring is destructive but careful. The engine deletes live files the
//! checkpoint does not contain, prunes directories those deletions left
//! empty (never a directory some checkpoint file still needs, never the
//! storage area, never `.git`), then copies every checkpoint entry back with
//! its permission bits and symlink targets intact.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ckpt::{find_repo_root, CheckpointStore};
//!
//! # fn main() -> ckpt::Result<()> {
//! let root = find_repo_root()?;
//! let store = CheckpointStore::new(root);
//!
//! // Capture the current working tree
//! let (meta, files) = store.push("before-refactor", false)?;
//! println!("captured {} files at {}", files, meta.created_at);
//!
//! // ... hack away ...
//!
//! // Put everything back
//! let result = store.restore("before-refactor")?;
//! println!("restored {} files", result.files_restored);
//! # Ok(())
//! # }
//! ```
//!
//! ## Invariants
//!
//! - The file set of a repository is whatever `git ls-files -co
//!   --exclude-standard` reports, minus the storage area itself.
//! - A checkpoint, once written, is immutable; only an explicit overwrite
//!   (`push` with force) or `nuke` removes one.
//! - Restore never deletes an ancestor directory of any checkpoint path,
//!   the storage area, or the `.git` directory.
//! - Operations are single-threaded and synchronous; concurrent invocations
//!   against one repository are the caller's bug, not handled here.
//!
//! ## Module Organization
//!
//! - [`repo`]: repository root discovery and project file enumeration
//! - [`checkpoint`]: checkpoint metadata, name validation, stats
//! - [`store`]: the on-disk storage area and capture/restore entry points
//! - [`restore`]: the three-phase restore engine
//! - [`utils`]: filesystem primitives (entry copying, permissions, symlinks)
//! - [`error`]: error types and handling

pub mod checkpoint;
pub mod error;
pub mod repo;
pub mod restore;
pub mod store;
pub mod utils;

pub use checkpoint::{validate_name, CheckpointMeta, CheckpointStats};
pub use error::{CkptError, Result};
pub use repo::{find_repo_root, find_repo_root_from, list_repo_files};
pub use restore::RestoreResult;
pub use store::{is_storage_path, CheckpointStore, STORAGE_DIR_NAME};
