//! Checkpoint metadata and per-checkpoint statistics
//!
//! A checkpoint is a named, timestamped, immutable-once-written snapshot of
//! a repository's file set. Its on-disk form is a directory mirroring the
//! captured relative paths plus one reserved `meta.json` at its root, which
//! is the only file excluded from the checkpoint's content set.

use crate::error::{CkptError, Result};
use crate::utils;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

/// Reserved metadata file at the root of every checkpoint directory
pub const META_FILE_NAME: &str = "meta.json";

/// Metadata persisted with every checkpoint
///
/// `created_at` is serialized as an RFC 3339 UTC timestamp, which round-trips
/// at full precision and compares chronologically as a string or as a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    /// Checkpoint name, unique within the storage area
    pub name: String,
    /// Creation timestamp (UTC)
    pub created_at: DateTime<Utc>,
}

impl CheckpointMeta {
    /// Create metadata stamped with the current time
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// Validate a checkpoint name before it is joined onto the storage area path.
///
/// Rejects names that would escape the storage area or collide with the
/// directory structure: empty names, names containing path separators, and
/// the `.`/`..` components.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CkptError::invalid_name("name cannot be empty"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(CkptError::invalid_name(format!(
            "name cannot contain path separators: '{name}'"
        )));
    }
    if name == "." || name == ".." {
        return Err(CkptError::invalid_name(format!(
            "name cannot be '{name}'"
        )));
    }
    Ok(())
}

/// Serialize metadata to the reserved file, replacing any prior content.
///
/// The write goes through a temp file and rename so a crash never leaves a
/// half-written `meta.json` behind.
pub fn write_meta(checkpoint_dir: &Path, meta: &CheckpointMeta) -> Result<()> {
    let content = serde_json::to_vec_pretty(meta)?;
    utils::atomic_write(&checkpoint_dir.join(META_FILE_NAME), &content)
}

/// Read and decode a checkpoint's metadata file.
pub fn read_meta(checkpoint_dir: &Path) -> Result<CheckpointMeta> {
    let path = checkpoint_dir.join(META_FILE_NAME);
    let content = fs::read(&path).map_err(|e| CkptError::io("read metadata", &path, e))?;
    Ok(serde_json::from_slice(&content)?)
}

/// Display statistics for a checkpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckpointStats {
    /// Number of entries in the checkpoint's file set
    pub file_count: usize,
    /// Total line count across all regular files
    pub line_count: usize,
}

/// Count the lines of a file.
///
/// A line is a `\n`; a non-empty file that does not end in `\n` still counts
/// its final partial line. Reads in fixed-size chunks so large files never
/// land in memory whole.
pub fn count_lines(path: &Path) -> Result<usize> {
    let mut file = File::open(path).map_err(|e| CkptError::io("open", path, e))?;
    let mut buffer = vec![0u8; 8192];
    let mut lines = 0;
    let mut saw_data = false;
    let mut last_byte = 0u8;

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| CkptError::io("read", path, e))?;
        if bytes_read == 0 {
            break;
        }
        saw_data = true;
        for &b in &buffer[..bytes_read] {
            if b == b'\n' {
                lines += 1;
            }
        }
        last_byte = buffer[bytes_read - 1];
    }

    if saw_data && last_byte != b'\n' {
        lines += 1;
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("release-1").is_ok());
        assert!(validate_name("v1.0").is_ok());

        assert!(matches!(validate_name(""), Err(CkptError::InvalidName(_))));
        assert!(matches!(validate_name("a/b"), Err(CkptError::InvalidName(_))));
        assert!(matches!(validate_name("a\\b"), Err(CkptError::InvalidName(_))));
        assert!(matches!(validate_name("."), Err(CkptError::InvalidName(_))));
        assert!(matches!(validate_name(".."), Err(CkptError::InvalidName(_))));
    }

    #[test]
    fn test_meta_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let meta = CheckpointMeta {
            name: "v1".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 45).unwrap(),
        };

        write_meta(temp_dir.path(), &meta).unwrap();
        let read_back = read_meta(temp_dir.path()).unwrap();

        assert_eq!(read_back, meta);
    }

    #[test]
    fn test_write_meta_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        write_meta(temp_dir.path(), &CheckpointMeta::new("first")).unwrap();
        write_meta(temp_dir.path(), &CheckpointMeta::new("second")).unwrap();

        assert_eq!(read_meta(temp_dir.path()).unwrap().name, "second");
    }

    #[test]
    fn test_read_meta_missing() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            read_meta(temp_dir.path()),
            Err(CkptError::Io { op: "read metadata", .. })
        ));
    }

    #[test]
    fn test_read_meta_malformed() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(META_FILE_NAME), b"not json").unwrap();
        assert!(matches!(read_meta(temp_dir.path()), Err(CkptError::Json(_))));
    }

    #[test]
    fn test_count_lines() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("f.txt");

        fs::write(&path, b"").unwrap();
        assert_eq!(count_lines(&path).unwrap(), 0);

        fs::write(&path, b"one\ntwo\n").unwrap();
        assert_eq!(count_lines(&path).unwrap(), 2);

        // Trailing partial line still counts
        fs::write(&path, b"one\ntwo").unwrap();
        assert_eq!(count_lines(&path).unwrap(), 2);

        fs::write(&path, b"no newline at all").unwrap();
        assert_eq!(count_lines(&path).unwrap(), 1);
    }
}
