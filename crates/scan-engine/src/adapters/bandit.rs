//! Bandit adapter (Python static analysis)

use std::path::Path;

use scan_cascade_core::{CoreError, CoreResult};

use super::{
    count_at_or_above, read_json_report, scan_targets, AdapterContext, ParsedReport,
    ToolAdapter, ToolInvocation, ToolSettings,
};
use crate::models::{SeverityLevel, ToolName};

const REPORT_FILE: &str = "bandit.json";

/// Bandit's own default excludes; `-x` replaces them rather than adding.
const DEFAULT_EXCLUDES: &str = ".svn,CVS,.bzr,.hg,.git,__pycache__,.tox,.eggs,*.egg";

/// Runs `bandit -r` and reads its JSON report.
#[derive(Debug, Clone, Default)]
pub struct BanditAdapter {
    settings: ToolSettings,
}

impl BanditAdapter {
    pub fn new(settings: ToolSettings) -> Self {
        Self { settings }
    }
}

fn is_python(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("py") | Some("pyi")
    )
}

#[async_trait::async_trait]
impl ToolAdapter for BanditAdapter {
    fn tool(&self) -> ToolName {
        ToolName::Bandit
    }

    fn prepare(&self, ctx: &AdapterContext) -> Option<ToolInvocation> {
        let targets = scan_targets(&ctx.scope, is_python)?;
        let report = ctx.output_dir.join(REPORT_FILE);
        let excludes: Vec<String> = std::iter::once(DEFAULT_EXCLUDES.to_string())
            .chain(ctx.excluded())
            .collect();

        Some(
            ToolInvocation::new(self.settings.program_or("bandit"), &ctx.repo_root)
                .args(["-r", "-q", "-f", "json", "-o"])
                .arg(report.to_string_lossy().into_owned())
                .arg("--severity-level")
                .arg(ctx.min_severity.to_string().to_ascii_lowercase())
                .arg("-x")
                .arg(excludes.join(","))
                .args(self.settings.extra_args.iter().cloned())
                .args(targets)
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

        let results = json
            .get("results")
            .and_then(|r| r.as_array())
            .ok_or_else(|| CoreError::parse("bandit report has no 'results' array"))?;

        Ok(ParsedReport {
            report_paths: invocation.existing_reports(),
            findings_count: Some(count_at_or_above(results, min_severity, |r| {
                r.get("issue_severity").and_then(|s| s.as_str())
            })),
        })
    }
}
