//! Repository discovery and project file enumeration
//!
//! The question "which files belong to the project" is delegated entirely to
//! git: `ls-files -co --exclude-standard` yields every tracked and
//! untracked-but-not-ignored path, which the engine treats as ground truth.
//! The only post-filtering done here is dropping anything under the
//! checkpoint storage area, which is never itself checkpointed.

use crate::error::{CkptError, Result};
use crate::store;
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Name of the version-control marker directory
pub const GIT_DIR_NAME: &str = ".git";

/// Locate the repository root by walking upward from the current directory.
///
/// Fails with [`CkptError::NotInRepo`] when the filesystem root is reached
/// without finding a `.git` directory. The result is discovered fresh on
/// every call, never cached.
pub fn find_repo_root() -> Result<PathBuf> {
    let cwd = env::current_dir().map_err(|e| CkptError::io("get working directory", ".", e))?;
    find_repo_root_from(&cwd)
}

/// The upward walk behind [`find_repo_root`], starting from an explicit
/// directory. Terminates when a parent equals its child, i.e. at the
/// filesystem root.
pub fn find_repo_root_from(start: &Path) -> Result<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(GIT_DIR_NAME).is_dir() {
            debug!("repository root at {:?}", current);
            return Ok(current);
        }
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => return Err(CkptError::NotInRepo),
        }
    }
}

/// List every repository-relative path that belongs to the project.
///
/// Runs `git ls-files -co --exclude-standard -z` under `root` and returns
/// the NUL-separated output in git's order, minus anything under the
/// checkpoint storage area. Paths use `/` separators as git emits them.
pub fn list_repo_files(root: &Path) -> Result<Vec<String>> {
    let output = Command::new("git")
        .arg("-C")
        .arg(root)
        .args(["ls-files", "-co", "--exclude-standard", "-z"])
        .output()
        .map_err(|e| CkptError::ToolInvocation(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CkptError::ToolInvocation(stderr.trim().to_string()));
    }

    let stdout = std::str::from_utf8(&output.stdout)
        .map_err(|_| CkptError::PathEncoding(root.as_os_str().to_os_string()))?;

    let files: Vec<String> = stdout
        .split('\0')
        .filter(|entry| !entry.is_empty())
        .filter(|entry| !store::is_storage_path(entry))
        .map(str::to_string)
        .collect();

    debug!("git reports {} project files under {:?}", files.len(), root);
    Ok(files)
}
