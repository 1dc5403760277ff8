//! Scan Configuration Models
//!
//! Deployer-facing configuration stored in `scan-cascade.toml`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use scan_cascade_engine::{SkippedPolicy, ToolName, ToolSettings, DEFAULT_BASE_REF};
use serde::{Deserialize, Serialize};

use crate::utils::paths::{relative_inside, resolve_under};

/// What the runner does when the changed-file scope cannot be computed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeFallback {
    /// Scan the whole tree instead
    #[default]
    All,
    /// Abort the scan
    Abort,
}

/// Scan configuration stored in scan-cascade.toml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Scratch directory for per-tool output and the combined bundle
    pub work_dir: PathBuf,
    /// Root of the filesystem artifact store
    pub artifact_dir: PathBuf,
    /// How long published artifacts are kept
    pub retention_days: u32,
    /// Wall-clock budget for the whole schedule, in seconds
    pub global_timeout_secs: u64,
    /// Default per-tool timeout, in seconds
    pub tool_timeout_secs: u64,
    /// Base ref the changed-file scope is computed against
    pub base_ref: String,
    /// Behavior when changed-file resolution fails
    pub scope_fallback: ScopeFallback,
    /// Whether skipped tools contribute to the verdict
    pub skipped_policy: SkippedPolicy,
    /// Delay before the single publish retry, in milliseconds
    pub publish_retry_backoff_ms: u64,
    /// Per-tool settings keyed by tool name
    pub tools: BTreeMap<String, ToolSettings>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from(".scan-cascade/work"),
            artifact_dir: PathBuf::from(".scan-cascade/artifacts"),
            retention_days: 30,
            global_timeout_secs: 1800,
            tool_timeout_secs: 900,
            base_ref: DEFAULT_BASE_REF.to_string(),
            scope_fallback: ScopeFallback::default(),
            skipped_policy: SkippedPolicy::default(),
            publish_retry_backoff_ms: 2000,
            tools: BTreeMap::new(),
        }
    }
}

impl ScanConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.retention_days < 1 {
            return Err("retention_days must be at least 1".to_string());
        }

        if self.global_timeout_secs == 0 {
            return Err("global_timeout_secs must be greater than 0".to_string());
        }

        if self.tool_timeout_secs == 0 || self.tool_timeout_secs > self.global_timeout_secs {
            return Err(format!(
                "tool_timeout_secs must be between 1 and global_timeout_secs ({})",
                self.global_timeout_secs
            ));
        }

        if self.base_ref.trim().is_empty() {
            return Err("base_ref cannot be empty".to_string());
        }

        for (name, settings) in &self.tools {
            name.parse::<ToolName>().map_err(|e| e.to_string())?;
            if settings.timeout_secs == Some(0) {
                return Err(format!("tools.{}.timeout_secs must be greater than 0", name));
            }
        }

        Ok(())
    }

    /// Work and artifact directories that sit inside `repo_root`, relative to
    /// it. Tools are told to skip these.
    pub fn excluded_dirs(&self, repo_root: &Path) -> Vec<PathBuf> {
        let dirs: BTreeSet<PathBuf> = [&self.work_dir, &self.artifact_dir]
            .into_iter()
            .filter_map(|dir| relative_inside(repo_root, &resolve_under(repo_root, dir)))
            .collect();
        dirs.into_iter().collect()
    }

    pub fn global_timeout(&self) -> Duration {
        Duration::from_secs(self.global_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn publish_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.publish_retry_backoff_ms)
    }

    /// Per-tool settings keyed by `ToolName`; unknown names are dropped.
    pub fn tool_settings(&self) -> BTreeMap<ToolName, ToolSettings> {
        self.tools
            .iter()
            .filter_map(|(name, settings)| {
                name.parse::<ToolName>().ok().map(|tool| (tool, settings.clone()))
            })
            .collect()
    }
}
