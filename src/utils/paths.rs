//! Path Utilities
//!
//! Resolves configured directories against the repository being scanned.
//! Relative paths in `scan-cascade.toml` are relative to the repository root.

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

/// Default configuration file name, looked up in the repository root
pub const DEFAULT_CONFIG_FILE: &str = "scan-cascade.toml";

/// Canonical repository root; fails when `repo` is not a directory
pub fn repo_root(repo: &Path) -> AppResult<PathBuf> {
    if !repo.is_dir() {
        return Err(AppError::config(format!(
            "repository path is not a directory: {}",
            repo.display()
        )));
    }
    Ok(repo.canonicalize()?)
}

/// Resolve `path` under `root` unless it is already absolute
pub fn resolve_under(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Config file to load: the explicit path, or `scan-cascade.toml` in the repo
pub fn config_path(root: &Path, explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => root.join(DEFAULT_CONFIG_FILE),
    }
}

/// `path` relative to `root` when it lies strictly inside it
pub fn relative_inside(root: &Path, path: &Path) -> Option<PathBuf> {
    let relative = path.strip_prefix(root).ok()?;
    if relative.as_os_str().is_empty() {
        None
    } else {
        Some(relative.to_path_buf())
    }
}
