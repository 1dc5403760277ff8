//! Scan Models
//!
//! Data structures shared by every stage of a scan: the request, the resolved
//! scope, per-tool results, the aggregated bundle and the verdict.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use scan_cascade_core::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

// ============================================================================
// Enums
// ============================================================================

/// Supported external scanning tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolName {
    /// Python static analysis (bandit)
    Bandit,
    /// Multi-language pattern scanner (semgrep)
    Semgrep,
    /// Dependency, secret and misconfiguration scanner (trivy)
    Trivy,
    /// Malware scanner (clamscan)
    Clamav,
}

impl ToolName {
    /// Every known tool, in registry order
    pub const ALL: [ToolName; 4] = [
        ToolName::Bandit,
        ToolName::Semgrep,
        ToolName::Trivy,
        ToolName::Clamav,
    ];

    /// Stable identifier used on the command line, in config and as the
    /// artifact subdirectory name
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::Bandit => "bandit",
            ToolName::Semgrep => "semgrep",
            ToolName::Trivy => "trivy",
            ToolName::Clamav => "clamav",
        }
    }

    /// Get human-readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            ToolName::Bandit => "Bandit",
            ToolName::Semgrep => "Semgrep",
            ToolName::Trivy => "Trivy",
            ToolName::Clamav => "ClamAV",
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        ToolName::ALL
            .iter()
            .copied()
            .find(|tool| tool.as_str() == needle)
            .ok_or_else(|| CoreError::validation(format!("Unknown tool: '{}'", s.trim())))
    }
}

/// Parse a comma-separated tool selection such as `"bandit, semgrep"`.
///
/// Empty entries are ignored, so `""` selects no tools. Duplicates collapse.
pub fn parse_tool_list(input: &str) -> CoreResult<BTreeSet<ToolName>> {
    input
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(ToolName::from_str)
        .collect()
}

/// Minimum finding severity that counts toward a positive result
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SeverityLevel {
    Low,
    Medium,
    High,
}

impl SeverityLevel {
    /// This level and every level above it, lowest first
    pub fn at_or_above(&self) -> Vec<SeverityLevel> {
        [SeverityLevel::Low, SeverityLevel::Medium, SeverityLevel::High]
            .into_iter()
            .filter(|level| level >= self)
            .collect()
    }

    /// Map a tool-native severity label onto this scale.
    ///
    /// Unknown labels return `None`; `CRITICAL`/`ERROR` fold into `High`.
    pub fn from_label(label: &str) -> Option<SeverityLevel> {
        match label.trim().to_ascii_uppercase().as_str() {
            "LOW" | "INFO" | "UNDEFINED" => Some(SeverityLevel::Low),
            "MEDIUM" | "MODERATE" | "WARNING" => Some(SeverityLevel::Medium),
            "HIGH" | "CRITICAL" | "ERROR" => Some(SeverityLevel::High),
            _ => None,
        }
    }
}

impl Default for SeverityLevel {
    fn default() -> Self {
        SeverityLevel::Low
    }
}

impl std::fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeverityLevel::Low => write!(f, "LOW"),
            SeverityLevel::Medium => write!(f, "MEDIUM"),
            SeverityLevel::High => write!(f, "HIGH"),
        }
    }
}

impl FromStr for SeverityLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(SeverityLevel::Low),
            "MEDIUM" => Ok(SeverityLevel::Medium),
            "HIGH" => Ok(SeverityLevel::High),
            other => Err(CoreError::validation(format!(
                "Unknown severity '{}', expected LOW, MEDIUM or HIGH",
                other
            ))),
        }
    }
}

/// Which part of the codebase a scan considers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeMode {
    /// Entire tree
    All,
    /// Only files changed relative to a reference point
    Changed,
}

impl Default for ScopeMode {
    fn default() -> Self {
        ScopeMode::All
    }
}

impl std::fmt::Display for ScopeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopeMode::All => write!(f, "all"),
            ScopeMode::Changed => write!(f, "changed"),
        }
    }
}

impl FromStr for ScopeMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(ScopeMode::All),
            "changed" => Ok(ScopeMode::Changed),
            other => Err(CoreError::validation(format!(
                "Unknown scope '{}', expected 'all' or 'changed'",
                other
            ))),
        }
    }
}

/// Outcome of one tool within a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolOutcome {
    /// Tool ran and reported nothing at or above the threshold
    Succeeded,
    /// Tool ran and reported findings
    FailedWithFindings,
    /// Tool could not run, crashed, or produced an unreadable report
    FailedExecution,
    /// Tool was selected but had nothing to scan
    Skipped,
    /// Tool exceeded its own or the global time budget
    TimedOut,
}

impl ToolOutcome {
    /// Whether this outcome counts toward a positive verdict
    pub fn contributes_to_verdict(&self) -> bool {
        matches!(
            self,
            ToolOutcome::FailedWithFindings | ToolOutcome::FailedExecution | ToolOutcome::TimedOut
        )
    }

    /// Whether a findings count may accompany this outcome
    pub fn carries_findings_count(&self) -> bool {
        matches!(self, ToolOutcome::Succeeded | ToolOutcome::FailedWithFindings)
    }
}

impl std::fmt::Display for ToolOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolOutcome::Succeeded => write!(f, "succeeded"),
            ToolOutcome::FailedWithFindings => write!(f, "failed_with_findings"),
            ToolOutcome::FailedExecution => write!(f, "failed_execution"),
            ToolOutcome::Skipped => write!(f, "skipped"),
            ToolOutcome::TimedOut => write!(f, "timed_out"),
        }
    }
}

// ============================================================================
// Request & Scope
// ============================================================================

/// Immutable description of one scan invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    /// Tools to schedule
    pub tools: BTreeSet<ToolName>,
    /// Requested scope mode, resolved once into a `Scope`
    pub scope: ScopeMode,
    /// Minimum severity passed to every adapter
    pub min_severity: SeverityLevel,
    /// Whether the caller aborts when the verdict reports findings
    pub fail_on_findings: bool,
}

impl ScanRequest {
    /// Create a new request
    pub fn new(tools: BTreeSet<ToolName>, scope: ScopeMode, min_severity: SeverityLevel) -> Self {
        Self {
            tools,
            scope,
            min_severity,
            fail_on_findings: false,
        }
    }

    /// Set the fail-on-findings flag
    pub fn fail_on_findings(mut self, fail: bool) -> Self {
        self.fail_on_findings = fail;
        self
    }
}

/// Resolved scan scope shared read-only by all adapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    /// Scope mode
    pub mode: ScopeMode,
    /// Changed files relative to the repository root (empty for `All`)
    pub files: Vec<PathBuf>,
}

impl Scope {
    /// Whole-tree scope
    pub fn all() -> Self {
        Self {
            mode: ScopeMode::All,
            files: Vec::new(),
        }
    }

    /// Changed-file scope; the file list is sorted and de-duplicated.
    pub fn changed(files: impl IntoIterator<Item = PathBuf>) -> Self {
        let files: BTreeSet<PathBuf> = files.into_iter().collect();
        Self {
            mode: ScopeMode::Changed,
            files: files.into_iter().collect(),
        }
    }

    /// Whether this is a changed-file scope with no files in it
    pub fn is_empty_change_set(&self) -> bool {
        self.mode == ScopeMode::Changed && self.files.is_empty()
    }

    /// Changed files accepted by `filter`, or `None` for a whole-tree scope.
    pub fn changed_files_matching<F>(&self, filter: F) -> Option<Vec<&Path>>
    where
        F: Fn(&Path) -> bool,
    {
        match self.mode {
            ScopeMode::All => None,
            ScopeMode::Changed => Some(
                self.files
                    .iter()
                    .map(PathBuf::as_path)
                    .filter(|path| filter(path))
                    .collect(),
            ),
        }
    }
}

// ============================================================================
// Tool Result
// ============================================================================

/// Result of running one tool adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    /// Tool that produced this result
    pub tool: ToolName,
    /// Outcome
    pub outcome: ToolOutcome,
    /// Native report files written by the tool
    pub report_paths: BTreeSet<PathBuf>,
    /// Number of findings at or above the threshold, when known
    pub findings_count: Option<u64>,
    /// Duration in milliseconds
    pub duration_ms: u64,
    /// Skip reason, execution error or timeout note
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ToolResult {
    /// Create a succeeded result
    pub fn succeeded(
        tool: ToolName,
        report_paths: BTreeSet<PathBuf>,
        findings_count: u64,
        duration_ms: u64,
    ) -> Self {
        Self {
            tool,
            outcome: ToolOutcome::Succeeded,
            report_paths,
            findings_count: Some(findings_count),
            duration_ms,
            message: None,
        }
    }

    /// Create a result for a tool that reported findings
    pub fn with_findings(
        tool: ToolName,
        report_paths: BTreeSet<PathBuf>,
        findings_count: Option<u64>,
        duration_ms: u64,
    ) -> Self {
        Self {
            tool,
            outcome: ToolOutcome::FailedWithFindings,
            report_paths,
            findings_count,
            duration_ms,
            message: None,
        }
    }

    /// Create a result for a tool that could not complete
    pub fn execution_failed(tool: ToolName, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            tool,
            outcome: ToolOutcome::FailedExecution,
            report_paths: BTreeSet::new(),
            findings_count: None,
            duration_ms,
            message: Some(error.into()),
        }
    }

    /// Create a result for a tool with nothing to scan
    pub fn skipped(tool: ToolName, reason: impl Into<String>) -> Self {
        Self {
            tool,
            outcome: ToolOutcome::Skipped,
            report_paths: BTreeSet::new(),
            findings_count: None,
            duration_ms: 0,
            message: Some(reason.into()),
        }
    }

    /// Create a result for a tool that ran out of time
    pub fn timed_out(tool: ToolName, duration_ms: u64) -> Self {
        Self {
            tool,
            outcome: ToolOutcome::TimedOut,
            report_paths: BTreeSet::new(),
            findings_count: None,
            duration_ms,
            message: Some(format!("timed out after {} ms", duration_ms)),
        }
    }

    /// Attach report paths to a failed result (partial output is still
    /// worth keeping in the bundle).
    pub fn with_reports(mut self, report_paths: BTreeSet<PathBuf>) -> Self {
        self.report_paths = report_paths;
        self
    }

    /// Replace the message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

// ============================================================================
// Bundle & Verdict
// ============================================================================

/// Merged per-tool results and their combined artifact directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedBundle {
    /// One result per scheduled tool
    pub results: BTreeMap<ToolName, ToolResult>,
    /// Root of the combined artifact area
    pub combined_artifact_dir: PathBuf,
    /// Tool subdirectories that were actually created
    pub tool_dirs: BTreeMap<ToolName, PathBuf>,
}

impl AggregatedBundle {
    /// Bundle with no results
    pub fn empty(combined_artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            results: BTreeMap::new(),
            combined_artifact_dir: combined_artifact_dir.into(),
            tool_dirs: BTreeMap::new(),
        }
    }

    /// Whether no tool was scheduled
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Per-tool outcome table
    pub fn summary(&self) -> ScanSummary {
        ScanSummary::from_results(&self.results)
    }
}

/// Aggregated boolean decision derived from all tool outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    /// Whether any tool contributed a non-clean outcome
    pub has_findings: bool,
    /// Tools whose outcome contributed
    pub contributing_tools: BTreeSet<ToolName>,
}

// ============================================================================
// Outcome Table
// ============================================================================

/// One row of the outcome table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeRow {
    pub tool: ToolName,
    pub outcome: ToolOutcome,
    pub findings_count: Option<u64>,
    pub duration_ms: u64,
    pub report_count: usize,
    pub message: Option<String>,
}

/// Summary of all tool outcomes for a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    /// Total number of scheduled tools
    pub total_tools: usize,
    /// Tools that succeeded
    pub succeeded: usize,
    /// Tools that reported findings
    pub with_findings: usize,
    /// Tools that failed to execute
    pub failed: usize,
    /// Tools that were skipped
    pub skipped: usize,
    /// Tools that timed out
    pub timed_out: usize,
    /// Sum of known findings counts
    pub total_findings: u64,
    /// Rows in tool order
    pub rows: Vec<OutcomeRow>,
}

impl ScanSummary {
    /// Build the table from a result mapping
    pub fn from_results(results: &BTreeMap<ToolName, ToolResult>) -> Self {
        let mut summary = Self {
            total_tools: results.len(),
            succeeded: 0,
            with_findings: 0,
            failed: 0,
            skipped: 0,
            timed_out: 0,
            total_findings: 0,
            rows: Vec::with_capacity(results.len()),
        };

        for result in results.values() {
            match result.outcome {
                ToolOutcome::Succeeded => summary.succeeded += 1,
                ToolOutcome::FailedWithFindings => summary.with_findings += 1,
                ToolOutcome::FailedExecution => summary.failed += 1,
                ToolOutcome::Skipped => summary.skipped += 1,
                ToolOutcome::TimedOut => summary.timed_out += 1,
            }
            summary.total_findings += result.findings_count.unwrap_or(0);
            summary.rows.push(OutcomeRow {
                tool: result.tool,
                outcome: result.outcome,
                findings_count: result.findings_count,
                duration_ms: result.duration_ms,
                report_count: result.report_paths.len(),
                message: result.message.clone(),
            });
        }

        summary
    }
}

impl std::fmt::Display for ScanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{:<10} {:<22} {:>9} {:>10} {:>8}  {}",
            "TOOL", "OUTCOME", "FINDINGS", "DURATION", "REPORTS", "NOTE"
        )?;
        for row in &self.rows {
            let findings = row
                .findings_count
                .map(|count| count.to_string())
                .unwrap_or_else(|| "-".to_string());
            writeln!(
                f,
                "{:<10} {:<22} {:>9} {:>8}ms {:>8}  {}",
                row.tool.as_str(),
                row.outcome.to_string(),
                findings,
                row.duration_ms,
                row.report_count,
                row.message.as_deref().unwrap_or("")
            )?;
        }
        write!(
            f,
            "{} tool(s): {} succeeded, {} with findings, {} failed, {} skipped, {} timed out",
            self.total_tools,
            self.succeeded,
            self.with_findings,
            self.failed,
            self.skipped,
            self.timed_out
        )
    }
}
