//! Result Aggregation
//!
//! Merges per-tool results into an `AggregatedBundle`. Each tool's report
//! files are copied into `<combined>/<tool>/`, so file names from different
//! tools never collide. A tool without report files gets no subdirectory.
//!
//! The copy plan is a pure function of the result mapping (`plan`); the
//! filesystem work in `aggregate` only carries it out.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use scan_cascade_core::CoreResult;

use crate::models::{AggregatedBundle, ToolName, ToolResult};

/// One report file to copy into the combined area
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyStep {
    /// Report written by the tool
    pub source: PathBuf,
    /// Destination inside the tool's subdirectory
    pub destination: PathBuf,
}

/// Claim `name` in `used`, prefixing a counter (starting at `index`) until
/// the result is not already taken.
fn unique_name(used: &mut BTreeSet<String>, name: String, index: usize) -> String {
    let mut candidate = name.clone();
    let mut prefix = index;
    while used.contains(&candidate) {
        candidate = format!("{}-{}", prefix, name);
        prefix += 1;
    }
    used.insert(candidate.clone());
    candidate
}

/// Merges tool results under one combined artifact directory.
#[derive(Debug, Clone)]
pub struct ResultAggregator {
    combined_dir: PathBuf,
}

impl ResultAggregator {
    /// Create an aggregator writing into `combined_dir`
    pub fn new(combined_dir: impl AsRef<Path>) -> Self {
        Self {
            combined_dir: combined_dir.as_ref().to_path_buf(),
        }
    }

    /// Root of the combined artifact area
    pub fn combined_dir(&self) -> &Path {
        &self.combined_dir
    }

    /// Subdirectory owned by `tool`
    pub fn tool_dir(&self, tool: ToolName) -> PathBuf {
        self.combined_dir.join(tool.as_str())
    }

    /// Compute the copy steps for every tool that produced report files.
    pub fn plan(
        &self,
        results: &BTreeMap<ToolName, ToolResult>,
    ) -> BTreeMap<ToolName, Vec<CopyStep>> {
        results
            .iter()
            .filter(|(_, result)| !result.report_paths.is_empty())
            .map(|(tool, result)| {
                let dir = self.tool_dir(*tool);
                let mut used: BTreeSet<String> = BTreeSet::new();
                let steps = result
                    .report_paths
                    .iter()
                    .enumerate()
                    .map(|(index, source)| {
                        let name = source
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_else(|| "report".to_string());
                        let name = unique_name(&mut used, name, index);
                        CopyStep {
                            source: source.clone(),
                            destination: dir.join(name),
                        }
                    })
                    .collect();
                (*tool, steps)
            })
            .collect()
    }

    /// Copy every tool's reports into the combined area and build the bundle.
    ///
    /// Only failing to create the combined directory itself is an error; a
    /// report that vanished or could not be copied is skipped with a warning.
    pub async fn aggregate(
        &self,
        results: BTreeMap<ToolName, ToolResult>,
    ) -> CoreResult<AggregatedBundle> {
        tokio::fs::create_dir_all(&self.combined_dir).await?;

        let mut tool_dirs = BTreeMap::new();
        for (tool, steps) in self.plan(&results) {
            let dir = self.tool_dir(tool);
            let mut copied = 0usize;

            for step in steps {
                if !step.source.is_file() {
                    tracing::warn!(
                        tool = %tool,
                        source = %step.source.display(),
                        "report listed but missing; skipping"
                    );
                    continue;
                }
                if copied == 0 {
                    if let Err(e) = tokio::fs::create_dir_all(&dir).await {
                        tracing::warn!(tool = %tool, "failed to create {}: {}", dir.display(), e);
                        break;
                    }
                }
                match tokio::fs::copy(&step.source, &step.destination).await {
                    Ok(_) => copied += 1,
                    Err(e) => tracing::warn!(
                        tool = %tool,
                        source = %step.source.display(),
                        "failed to copy report: {}",
                        e
                    ),
                }
            }

            if copied > 0 {
                tool_dirs.insert(tool, dir);
            }
        }

        tracing::info!(
            tools = results.len(),
            with_output = tool_dirs.len(),
            combined_dir = %self.combined_dir.display(),
            "aggregated scan results"
        );

        Ok(AggregatedBundle {
            results,
            combined_artifact_dir: self.combined_dir.clone(),
            tool_dirs,
        })
    }
}
