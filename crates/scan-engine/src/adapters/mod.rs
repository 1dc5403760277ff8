//! Tool Adapters
//!
//! One adapter per external scanner. Every adapter shares the same run flow:
//! 1. `prepare` - build the command line from scope and severity (`None` = nothing to scan)
//! 2. `invoke` - run the executable under a time bound
//! 3. `classify_exit` - map the tool's exit convention onto clean / findings / error
//! 4. `parse_report` - read the native report into report paths and a findings count
//!
//! Findings are a normal outcome. Nothing in `run` returns an error: every
//! failure becomes a `ToolResult` with the matching `ToolOutcome`.

mod bandit;
mod clamav;
mod registry;
mod semgrep;
mod trivy;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use scan_cascade_core::{CoreError, CoreResult};
use tokio::process::Command;

use crate::models::{Scope, SeverityLevel, ToolName, ToolResult};

pub use bandit::BanditAdapter;
pub use clamav::ClamavAdapter;
pub use registry::{AdapterFactory, AdapterRegistry, ToolSettings};
pub use semgrep::SemgrepAdapter;
pub use trivy::TrivyAdapter;

/// Maximum number of stderr characters kept in an execution error message
const STDERR_TAIL_CHARS: usize = 400;

// ============================================================================
// Invocation Types
// ============================================================================

/// Everything an adapter needs to run once.
#[derive(Debug, Clone)]
pub struct AdapterContext {
    /// Repository root the tool runs in
    pub repo_root: PathBuf,
    /// Scope shared by all adapters of this scan
    pub scope: Arc<Scope>,
    /// Minimum severity that counts as a finding
    pub min_severity: SeverityLevel,
    /// Isolated output directory owned by this adapter
    pub output_dir: PathBuf,
    /// Repository-relative directories the tool must skip (scan scratch and
    /// published artifacts)
    pub excluded_dirs: Vec<PathBuf>,
}

impl AdapterContext {
    /// Excluded directories as `/`-separated strings
    pub fn excluded(&self) -> impl Iterator<Item = String> + '_ {
        self.excluded_dirs
            .iter()
            .map(|dir| dir.to_string_lossy().replace('\\', "/"))
    }
}

/// A fully built external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Executable name or path
    pub program: String,
    /// Arguments
    pub args: Vec<String>,
    /// Working directory
    pub working_dir: PathBuf,
    /// Report files the tool is expected to write
    pub reports: Vec<PathBuf>,
}

impl ToolInvocation {
    /// Create an invocation
    pub fn new(program: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
            reports: Vec::new(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Declare an expected report file
    pub fn report(mut self, path: impl Into<PathBuf>) -> Self {
        self.reports.push(path.into());
        self
    }

    /// Declared reports that exist on disk
    pub fn existing_reports(&self) -> BTreeSet<PathBuf> {
        self.reports.iter().filter(|p| p.is_file()).cloned().collect()
    }

    /// Command line for logging
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured process output
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// Exit code, `None` when terminated by a signal
    pub exit_code: Option<i32>,
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
}

/// How a tool's exit status is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitClass {
    /// Ran and found nothing
    Clean,
    /// Ran and signalled findings
    Findings,
    /// Did not complete normally
    Error,
}

/// Report paths and findings count read from a tool's native output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedReport {
    /// Report files that exist
    pub report_paths: BTreeSet<PathBuf>,
    /// Findings at or above the threshold; `None` when no report was written
    pub findings_count: Option<u64>,
}

// ============================================================================
// Adapter Trait
// ============================================================================

/// Adapter around one external scanning tool.
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    /// Tool this adapter drives
    fn tool(&self) -> ToolName;

    /// Build the command for this scope, or `None` when there is nothing to scan.
    fn prepare(&self, ctx: &AdapterContext) -> Option<ToolInvocation>;

    /// Read the tool's native report(s).
    ///
    /// A missing report is not an error (`findings_count = None`); a report
    /// that exists but cannot be parsed is.
    fn parse_report(
        &self,
        invocation: &ToolInvocation,
        min_severity: SeverityLevel,
    ) -> CoreResult<ParsedReport>;

    /// Map an exit code onto the tool's convention (default: 0 clean, 1 findings).
    fn classify_exit(&self, exit_code: Option<i32>) -> ExitClass {
        match exit_code {
            Some(0) => ExitClass::Clean,
            Some(1) => ExitClass::Findings,
            _ => ExitClass::Error,
        }
    }

    /// Run the external process.
    async fn invoke(&self, invocation: &ToolInvocation) -> CoreResult<ProcessOutput> {
        execute_process(invocation).await
    }

    /// Run the tool end to end. Never fails: every error becomes an outcome.
    async fn run(&self, ctx: &AdapterContext, timeout: Duration) -> ToolResult {
        let tool = self.tool();
        let start = Instant::now();

        let Some(invocation) = self.prepare(ctx) else {
            tracing::info!(tool = %tool, "nothing to scan in the selected scope");
            return ToolResult::skipped(tool, "nothing to scan in the selected scope");
        };

        if let Err(e) = tokio::fs::create_dir_all(&ctx.output_dir).await {
            return ToolResult::execution_failed(
                tool,
                format!("Failed to create output directory: {}", e),
                elapsed_ms(start),
            );
        }

        tracing::debug!(tool = %tool, "running: {}", invocation.display());

        let output = match tokio::time::timeout(timeout, self.invoke(&invocation)).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return ToolResult::execution_failed(tool, e.to_string(), elapsed_ms(start));
            }
            Err(_) => {
                tracing::warn!(tool = %tool, timeout_secs = timeout.as_secs(), "tool timed out");
                let error = CoreError::tool_timeout(format!(
                    "{} exceeded its {} ms limit",
                    tool,
                    timeout.as_millis()
                ));
                return ToolResult::timed_out(tool, elapsed_ms(start))
                    .with_message(error.to_string());
            }
        };
        let duration_ms = elapsed_ms(start);

        let exit = self.classify_exit(output.exit_code);
        if exit == ExitClass::Error {
            let code = output
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return ToolResult::execution_failed(
                tool,
                format!("exited with {}: {}", code, tail(&output.stderr, STDERR_TAIL_CHARS)),
                duration_ms,
            )
            .with_reports(invocation.existing_reports());
        }

        match self.parse_report(&invocation, ctx.min_severity) {
            Ok(parsed) => {
                let counted = parsed.findings_count.map_or(false, |count| count > 0);
                if exit == ExitClass::Findings || counted {
                    ToolResult::with_findings(
                        tool,
                        parsed.report_paths,
                        parsed.findings_count,
                        duration_ms,
                    )
                } else {
                    ToolResult::succeeded(
                        tool,
                        parsed.report_paths,
                        parsed.findings_count.unwrap_or(0),
                        duration_ms,
                    )
                }
            }
            Err(e) => ToolResult::execution_failed(
                tool,
                format!("Failed to parse report: {}", e),
                duration_ms,
            )
            .with_reports(invocation.existing_reports()),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Spawn the invocation and wait for it. The child is killed if the returned
/// future is dropped, which is how timeouts and scheduler aborts stop it.
pub async fn execute_process(invocation: &ToolInvocation) -> CoreResult<ProcessOutput> {
    let output = Command::new(&invocation.program)
        .args(&invocation.args)
        .current_dir(&invocation.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| {
            CoreError::tool_execution(format!("Failed to execute '{}': {}", invocation.program, e))
        })?;

    Ok(ProcessOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Read a JSON report. `Ok(None)` if the file does not exist.
pub(crate) fn read_json_report(path: &Path) -> CoreResult<Option<serde_json::Value>> {
    if !path.is_file() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let value = serde_json::from_str(&content).map_err(|e| {
        CoreError::parse(format!("Malformed report {}: {}", path.display(), e))
    })?;
    Ok(Some(value))
}

/// Count entries of a JSON array whose severity label (found by `severity`)
/// is at or above `min_severity`. Entries with an unknown label count.
pub(crate) fn count_at_or_above<'a, I, F>(
    entries: I,
    min_severity: SeverityLevel,
    severity: F,
) -> u64
where
    I: IntoIterator<Item = &'a serde_json::Value>,
    F: Fn(&serde_json::Value) -> Option<&str>,
{
    entries
        .into_iter()
        .filter(|entry| {
            severity(entry)
                .and_then(SeverityLevel::from_label)
                .map_or(true, |level| level >= min_severity)
        })
        .count() as u64
}

/// Scan targets relative to the repository root: `.` for a whole-tree scope,
/// the matching changed files otherwise, `None` when no changed file matches.
pub(crate) fn scan_targets<F>(scope: &Scope, filter: F) -> Option<Vec<String>>
where
    F: Fn(&Path) -> bool,
{
    match scope.changed_files_matching(filter) {
        None => Some(vec![".".to_string()]),
        Some(files) if files.is_empty() => None,
        Some(files) => Some(
            files
                .into_iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
        ),
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Last `max_chars` characters of `s`, trimmed
fn tail(s: &str, max_chars: usize) -> String {
    let trimmed = s.trim();
    let count = trimmed.chars().count();
    if count <= max_chars {
        trimmed.to_string()
    } else {
        let skipped: String = trimmed.chars().skip(count - max_chars).collect();
        format!("...{}", skipped)
    }
}
