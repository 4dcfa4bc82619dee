//! Filesystem primitives shared by capture and restore
//!
//! The one operation with real rules is [`copy_entry`]: it must reproduce a
//! filesystem entry (regular file, directory, or symlink) at the destination
//! with its type, permission bits, and link target intact, without ever
//! following a symlink on the source side.

use crate::error::{CkptError, Result};
use std::fs;
use std::io;
use std::path::Path;
use tracing::trace;

/// Copy one filesystem entry from `src` to `dst`, preserving its type.
///
/// The source's own type is inspected with `symlink_metadata`, so a symlink
/// is copied as a symlink even when its target is a directory or missing.
///
/// - **Symlink**: the link target is copied verbatim. A relative target that
///   depended on the link's position in the tree may dangle at the new
///   location; targets are deliberately not rewritten.
/// - **Directory**: created along with any missing ancestors (idempotent).
/// - **Regular file**: copied byte-for-byte, then the source's permission
///   bits are applied. A crash mid-copy can leave a truncated destination;
///   that surfaces as an error to the caller, never as silent success.
pub fn copy_entry(src: &Path, dst: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(src).map_err(|e| CkptError::io("stat", src, e))?;

    if meta.file_type().is_symlink() {
        copy_symlink(src, dst)
    } else if meta.is_dir() {
        fs::create_dir_all(dst).map_err(|e| CkptError::io("create directory", dst, e))
    } else {
        copy_file(src, dst, get_permissions(&meta))
    }
}

fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let target = fs::read_link(src).map_err(|e| CkptError::io("read symlink", src, e))?;

    ensure_parent(dst)?;

    // Clear whatever occupies the destination: a stale file, a directory,
    // or a dangling link (which `exists()` would miss).
    if let Ok(existing) = fs::symlink_metadata(dst) {
        if existing.is_dir() {
            fs::remove_dir_all(dst).map_err(|e| CkptError::io("remove directory", dst, e))?;
        } else {
            fs::remove_file(dst).map_err(|e| CkptError::io("remove", dst, e))?;
        }
    }

    trace!("creating symlink {:?} -> {:?}", dst, target);
    create_symlink(&target, dst)
}

fn copy_file(src: &Path, dst: &Path, mode: u32) -> Result<()> {
    ensure_parent(dst)?;
    fs::copy(src, dst).map_err(|e| CkptError::io("copy", src, e))?;
    set_permissions(dst, mode)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| CkptError::io("create directory", parent, e))?;
    }
    Ok(())
}

/// Get Unix permission bits from metadata
#[cfg(unix)]
pub fn get_permissions(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

/// Get permission bits from metadata (Windows implementation)
#[cfg(windows)]
pub fn get_permissions(metadata: &fs::Metadata) -> u32 {
    // Map the read-only attribute onto Unix-like bits
    let mut mode = 0o644;
    if metadata.permissions().readonly() {
        mode = 0o444;
    }
    if metadata.is_dir() {
        mode |= 0o111;
    }
    mode
}

/// Set Unix permission bits
#[cfg(unix)]
pub fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let permissions = fs::Permissions::from_mode(mode);
    fs::set_permissions(path, permissions).map_err(|e| CkptError::io("set permissions", path, e))
}

/// Set permission bits (Windows implementation)
#[cfg(windows)]
pub fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    // Only the read-only attribute can be expressed
    let metadata =
        fs::metadata(path).map_err(|e| CkptError::io("stat", path, e))?;
    let mut perms = metadata.permissions();
    perms.set_readonly(mode & 0o200 == 0);
    fs::set_permissions(path, perms).map_err(|e| CkptError::io("set permissions", path, e))
}

/// Create a symlink (cross-platform)
#[cfg(unix)]
pub fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    use std::os::unix::fs::symlink;
    symlink(target, link).map_err(|e| CkptError::io("create symlink", link, e))
}

/// Create a symlink (Windows)
#[cfg(windows)]
pub fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    use std::os::windows::fs::{symlink_dir, symlink_file};

    let result = if target.is_dir() {
        symlink_dir(target, link)
    } else {
        symlink_file(target, link)
    };
    result.map_err(|e| CkptError::io("create symlink", link, e))
}

/// Remove a directory only if it is empty.
///
/// Emptiness is tested directly with `read_dir` rather than by sniffing the
/// platform's "directory not empty" error message. Returns whether the
/// directory was removed; I/O errors are left raw so the caller can decide
/// which kinds to tolerate.
pub fn remove_dir_if_empty(path: &Path) -> io::Result<bool> {
    if fs::read_dir(path)?.next().is_some() {
        return Ok(false);
    }
    fs::remove_dir(path)?;
    trace!("removed empty directory {:?}", path);
    Ok(true)
}

/// Atomic file write (write to temp file then rename)
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, content).map_err(|e| CkptError::io("write", &temp_path, e))?;
    fs::rename(&temp_path, path).map_err(|e| CkptError::io("rename", path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_copy_entry_regular_file() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("src.txt");
        let dst = temp_dir.path().join("nested/deep/dst.txt");
        fs::write(&src, b"content").unwrap();

        copy_entry(&src, &dst).unwrap();

        assert_eq!(fs::read(&dst).unwrap(), b"content");
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_entry_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("script.sh");
        let dst = temp_dir.path().join("out/script.sh");
        fs::write(&src, b"#!/bin/sh\n").unwrap();
        fs::set_permissions(&src, fs::Permissions::from_mode(0o755)).unwrap();

        copy_entry(&src, &dst).unwrap();

        let mode = fs::metadata(&dst).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_copy_entry_directory() {
        let temp_dir = TempDir::new().unwrap();
        let src = temp_dir.path().join("dir");
        let dst = temp_dir.path().join("copy/of/dir");
        fs::create_dir(&src).unwrap();

        copy_entry(&src, &dst).unwrap();
        assert!(dst.is_dir());

        // Idempotent
        copy_entry(&src, &dst).unwrap();
        assert!(dst.is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_entry_symlink_verbatim_target() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("target.txt");
        let link = temp_dir.path().join("link");
        let dst = temp_dir.path().join("out/link");
        fs::write(&target, b"data").unwrap();
        create_symlink(Path::new("target.txt"), &link).unwrap();

        copy_entry(&link, &dst).unwrap();

        let copied = fs::read_link(&dst).unwrap();
        assert_eq!(copied, PathBuf::from("target.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_entry_symlink_replaces_existing() {
        let temp_dir = TempDir::new().unwrap();
        let link = temp_dir.path().join("link");
        let dst = temp_dir.path().join("dst");
        create_symlink(Path::new("somewhere"), &link).unwrap();
        fs::write(&dst, b"old file").unwrap();

        copy_entry(&link, &dst).unwrap();

        assert_eq!(fs::read_link(&dst).unwrap(), PathBuf::from("somewhere"));
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_entry_dangling_symlink() {
        let temp_dir = TempDir::new().unwrap();
        let link = temp_dir.path().join("dangling");
        let dst = temp_dir.path().join("out/dangling");
        create_symlink(Path::new("no/such/target"), &link).unwrap();

        copy_entry(&link, &dst).unwrap();

        assert_eq!(fs::read_link(&dst).unwrap(), PathBuf::from("no/such/target"));
    }

    #[test]
    fn test_remove_dir_if_empty() {
        let temp_dir = TempDir::new().unwrap();
        let empty = temp_dir.path().join("empty");
        let occupied = temp_dir.path().join("occupied");
        fs::create_dir(&empty).unwrap();
        fs::create_dir(&occupied).unwrap();
        fs::write(occupied.join("file.txt"), b"x").unwrap();

        assert!(remove_dir_if_empty(&empty).unwrap());
        assert!(!empty.exists());

        assert!(!remove_dir_if_empty(&occupied).unwrap());
        assert!(occupied.exists());
    }

    #[test]
    fn test_remove_dir_if_empty_missing() {
        let temp_dir = TempDir::new().unwrap();
        let gone = temp_dir.path().join("gone");
        let err = remove_dir_if_empty(&gone).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_atomic_write() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("meta.json");

        atomic_write(&path, b"{}").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"{}");
        assert!(!path.with_extension("tmp").exists());
    }
}
