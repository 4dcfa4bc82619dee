//! Error types for the ckpt library
//!
//! All fallible operations return [`Result`]. Filesystem failures carry the
//! operation and the path that failed, since a restore that stops halfway
//! through is only diagnosable from that context.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Type alias for Results in the ckpt library
pub type Result<T> = std::result::Result<T, CkptError>;

/// Main error type for all ckpt operations
#[derive(Debug, Error)]
pub enum CkptError {
    /// No `.git` directory found walking up from the working directory
    #[error("not inside a git repository (no .git directory found)")]
    NotInRepo,

    /// The git file listing could not be completed
    #[error("git ls-files failed: {0}")]
    ToolInvocation(String),

    /// Checkpoint name collision without the overwrite flag
    #[error("checkpoint '{0}' already exists (use --force to overwrite)")]
    AlreadyExists(String),

    /// Named checkpoint does not exist
    #[error("checkpoint '{0}' not found")]
    CheckpointNotFound(String),

    /// Latest-checkpoint lookup found an empty or missing storage area
    #[error("no checkpoints found")]
    NoCheckpoints,

    /// Checkpoint name failed validation
    #[error("invalid checkpoint name: {0}")]
    InvalidName(String),

    /// I/O failure with operation and path context
    #[error("{} '{}': {}", .op, .path.display(), .source)]
    Io {
        /// What was being attempted (e.g. "copy", "remove")
        op: &'static str,
        /// The path the operation failed on
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },

    /// User declined an interactive confirmation
    #[error("operation cancelled")]
    Cancelled,

    /// Errors during metadata serialization/deserialization
    #[error("metadata error: {0}")]
    Json(#[from] serde_json::Error),

    /// Walk directory error from walkdir crate
    #[error("walk directory error: {0}")]
    Walk(#[from] walkdir::Error),

    /// A path produced by git or the filesystem was not valid UTF-8
    #[error("path is not valid UTF-8: {0:?}")]
    PathEncoding(OsString),
}

impl CkptError {
    /// Wrap an I/O error with the operation and path it failed on
    pub fn io(op: &'static str, path: impl AsRef<Path>, source: io::Error) -> Self {
        CkptError::Io {
            op,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create an invalid-name error with a custom message
    pub fn invalid_name(msg: impl Into<String>) -> Self {
        CkptError::InvalidName(msg.into())
    }
}
