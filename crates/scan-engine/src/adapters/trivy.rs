//! Trivy adapter (dependencies, secrets, misconfiguration)
//!
//! Trivy scans directories, not file lists, so a changed-file scope still
//! scans the repository root. An empty change set skips the tool.

use scan_cascade_core::{CoreError, CoreResult};

use super::{
    count_at_or_above, read_json_report, AdapterContext, ParsedReport, ToolAdapter,
    ToolInvocation, ToolSettings,
};
use crate::models::{SeverityLevel, ToolName};

const REPORT_FILE: &str = "trivy.json";

/// Finding arrays inside each entry of `Results`
const FINDING_KINDS: [&str; 3] = ["Vulnerabilities", "Misconfigurations", "Secrets"];

/// Runs `trivy fs` with `--exit-code 1`.
#[derive(Debug, Clone, Default)]
pub struct TrivyAdapter {
    settings: ToolSettings,
}

impl TrivyAdapter {
    pub fn new(settings: ToolSettings) -> Self {
        Self { settings }
    }

    fn severities(min_severity: SeverityLevel) -> &'static str {
        match min_severity {
            SeverityLevel::Low => "LOW,MEDIUM,HIGH,CRITICAL",
            SeverityLevel::Medium => "MEDIUM,HIGH,CRITICAL",
            SeverityLevel::High => "HIGH,CRITICAL",
        }
    }
}

#[async_trait::async_trait]
impl ToolAdapter for TrivyAdapter {
    fn tool(&self) -> ToolName {
        ToolName::Trivy
    }

    fn prepare(&self, ctx: &AdapterContext) -> Option<ToolInvocation> {
        if ctx.scope.is_empty_change_set() {
            return None;
        }
        let report = ctx.output_dir.join(REPORT_FILE);
        let skip_dirs: Vec<String> = ctx
            .excluded()
            .flat_map(|dir| ["--skip-dirs".to_string(), dir])
            .collect();

        Some(
            ToolInvocation::new(self.settings.program_or("trivy"), &ctx.repo_root)
                .args(["fs", "--quiet", "--scanners", "vuln,secret,misconfig"])
                .args(["--severity", Self::severities(ctx.min_severity)])
                .args(["--format", "json", "--exit-code", "1", "--output"])
                .arg(report.to_string_lossy().into_owned())
                .args(skip_dirs)
                .args(self.settings.extra_args.iter().cloned())
                .arg(".")
                .report(report),
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
        if !json.is_object() {
            return Err(CoreError::parse("trivy report is not a JSON object"));
        }

        // `Results` is omitted entirely when nothing was scanned.
        let findings: u64 = json
            .get("Results")
            .and_then(|r| r.as_array())
            .map(|results| {
                results
                    .iter()
                    .flat_map(|result| {
                        FINDING_KINDS
                            .iter()
                            .filter_map(move |kind| result.get(*kind).and_then(|v| v.as_array()))
                    })
                    .map(|entries| {
                        count_at_or_above(entries, min_severity, |e| {
                            e.get("Severity").and_then(|s| s.as_str())
                        })
                    })
                    .sum()
            })
            .unwrap_or(0);

        Ok(ParsedReport {
            report_paths: invocation.existing_reports(),
            findings_count: Some(findings),
        })
    }
}
