//! Semgrep adapter
//!
//! Writes both the native JSON report (used for counting) and a SARIF report
//! so the bundle carries one interoperable findings format.

use scan_cascade_core::{CoreError, CoreResult};

use super::{
    count_at_or_above, read_json_report, scan_targets, AdapterContext, ParsedReport,
    ToolAdapter, ToolInvocation, ToolSettings,
};
use crate::models::{SeverityLevel, ToolName};

const JSON_REPORT: &str = "semgrep.json";
const SARIF_REPORT: &str = "semgrep.sarif";

/// Runs `semgrep scan` with `--error` so findings set exit code 1.
#[derive(Debug, Clone, Default)]
pub struct SemgrepAdapter {
    settings: ToolSettings,
}

impl SemgrepAdapter {
    pub fn new(settings: ToolSettings) -> Self {
        Self { settings }
    }

    /// Semgrep severities at or above the threshold
    fn severities(min_severity: SeverityLevel) -> &'static [&'static str] {
        match min_severity {
            SeverityLevel::Low => &["INFO", "WARNING", "ERROR"],
            SeverityLevel::Medium => &["WARNING", "ERROR"],
            SeverityLevel::High => &["ERROR"],
        }
    }
}

#[async_trait::async_trait]
impl ToolAdapter for SemgrepAdapter {
    fn tool(&self) -> ToolName {
        ToolName::Semgrep
    }

    fn prepare(&self, ctx: &AdapterContext) -> Option<ToolInvocation> {
        let targets = scan_targets(&ctx.scope, |_| true)?;
        let json = ctx.output_dir.join(JSON_REPORT);
        let sarif = ctx.output_dir.join(SARIF_REPORT);

        let mut invocation =
            ToolInvocation::new(self.settings.program_or("semgrep"), &ctx.repo_root)
                .args(["scan", "--config", "auto", "--error", "--quiet"])
                .arg(format!("--json-output={}", json.display()))
                .arg(format!("--sarif-output={}", sarif.display()));
        for severity in Self::severities(ctx.min_severity) {
            invocation = invocation.arg("--severity").arg(*severity);
        }
        for dir in ctx.excluded() {
            invocation = invocation.arg("--exclude").arg(dir);
        }

        Some(
            invocation
                .args(self.settings.extra_args.iter().cloned())
                .args(targets)
                .report(json)
                .report(sarif),
        )
    }

    fn parse_report(
        &self,
        invocation: &ToolInvocation,
        min_severity: SeverityLevel,
    ) -> CoreResult<ParsedReport> {
        let Some(json) = read_json_report(&invocation.reports[0])? else {
            return Ok(ParsedReport::default());
        };

        let results = json
            .get("results")
            .and_then(|r| r.as_array())
            .ok_or_else(|| CoreError::parse("semgrep report has no 'results' array"))?;

        // SARIF is carried as-is; only check it is well-formed when present.
        if let Some(sarif_path) = invocation.reports.get(1) {
            read_json_report(sarif_path)?;
        }

        Ok(ParsedReport {
            report_paths: invocation.existing_reports(),
            findings_count: Some(count_at_or_above(results, min_severity, |r| {
                r.pointer("/extra/severity").and_then(|s| s.as_str())
            })),
        })
    }
}
