//! Scope Resolution
//!
//! Computes the scan scope shared by every adapter. A whole-tree scope needs
//! no repository access; a changed-file scope diffs the working tree against
//! the merge base of `HEAD` and a configured base ref.
//!
//! Resolution never falls back on its own: when history is unavailable the
//! caller receives `CoreError::ScopeResolution` and applies its own policy.

use std::path::{Path, PathBuf};

use scan_cascade_core::{CoreError, CoreResult};
use tokio::process::Command;

use crate::models::{Scope, ScopeMode};

/// Default reference the changed-file scope is diffed against
pub const DEFAULT_BASE_REF: &str = "origin/main";

/// Resolves a `ScopeMode` into a concrete `Scope` for one repository.
#[derive(Debug, Clone)]
pub struct ScopeResolver {
    /// Repository root
    repo_path: PathBuf,
    /// Ref whose merge base with HEAD anchors the diff
    base_ref: String,
}

impl ScopeResolver {
    /// Create a resolver for `repo_path` diffing against `DEFAULT_BASE_REF`
    pub fn new(repo_path: impl AsRef<Path>) -> Self {
        Self {
            repo_path: repo_path.as_ref().to_path_buf(),
            base_ref: DEFAULT_BASE_REF.to_string(),
        }
    }

    /// Set the base ref
    pub fn with_base_ref(mut self, base_ref: impl Into<String>) -> Self {
        self.base_ref = base_ref.into();
        self
    }

    /// Repository root this resolver inspects
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Resolve the scope for `mode`.
    pub async fn resolve(&self, mode: ScopeMode) -> CoreResult<Scope> {
        match mode {
            ScopeMode::All => Ok(Scope::all()),
            ScopeMode::Changed => self.resolve_changed().await,
        }
    }

    async fn resolve_changed(&self) -> CoreResult<Scope> {
        let shallow = self.git(&["rev-parse", "--is-shallow-repository"]).await?;
        if shallow.trim() == "true" {
            return Err(CoreError::scope(
                "repository is a shallow clone; fetch full history to scan changed files",
            ));
        }

        let merge_base = self
            .git(&["merge-base", self.base_ref.as_str(), "HEAD"])
            .await?
            .trim()
            .to_string();
        if merge_base.is_empty() {
            return Err(CoreError::scope(format!(
                "no merge base between '{}' and HEAD",
                self.base_ref
            )));
        }

        // quotePath off and NUL separators keep non-ASCII names verbatim.
        let diff = self
            .git(&[
                "-c",
                "core.quotePath=false",
                "diff",
                "-z",
                "--name-only",
                "--diff-filter=ACMR",
                merge_base.as_str(),
            ])
            .await?;
        let files = parse_name_only(&diff);

        tracing::info!(
            base_ref = %self.base_ref,
            merge_base = %merge_base,
            changed_files = files.len(),
            "resolved changed-file scope"
        );

        Ok(Scope::changed(files))
    }

    /// Run a read-only git command and return stdout, mapping every failure
    /// to a scope resolution error.
    async fn git(&self, args: &[&str]) -> CoreResult<String> {
        tracing::debug!("git {}", args.join(" "));

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .await
            .map_err(|e| CoreError::scope(format!("Failed to execute git: {}", e)))?;

        if !output.status.success() {
            return Err(CoreError::scope(format!(
                "git {} failed (exit {}): {}",
                args.join(" "),
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Parse NUL-separated `git diff -z --name-only` output into paths.
///
/// Entries are taken verbatim; names may legitimately carry spaces.
pub fn parse_name_only(stdout: &str) -> Vec<PathBuf> {
    stdout
        .split('\0')
        .filter(|entry| !entry.is_empty())
        .map(PathBuf::from)
        .collect()
}
