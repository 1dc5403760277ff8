//! ClamAV adapter (malware)
//!
//! `clamscan` has no severity scale; every infected file counts regardless of
//! the threshold. Exit codes: 0 clean, 1 infected, 2 error.

use scan_cascade_core::{CoreError, CoreResult};

use super::{
    scan_targets, AdapterContext, ParsedReport, ToolAdapter, ToolInvocation, ToolSettings,
};
use crate::models::{SeverityLevel, ToolName};

const LOG_FILE: &str = "clamav.log";

#[derive(Debug, Clone, Default)]
pub struct ClamavAdapter {
    settings: ToolSettings,
}

impl ClamavAdapter {
    pub fn new(settings: ToolSettings) -> Self {
        Self { settings }
    }
}

/// Count `<path>: <signature> FOUND` lines in a clamscan log.
fn count_infected(log: &str) -> u64 {
    log.lines()
        .filter(|line| line.trim_end().ends_with(" FOUND"))
        .count() as u64
}

/// `--exclude-dir` takes a regex matched against the full path.
fn exclude_dir_pattern(dir: &str) -> String {
    let mut pattern = String::from("/");
    for c in dir.chars() {
        if "\\.+*?()|[]{}^$".contains(c) {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push_str("(/|$)");
    pattern
}

#[async_trait::async_trait]
impl ToolAdapter for ClamavAdapter {
    fn tool(&self) -> ToolName {
        ToolName::Clamav
    }

    fn prepare(&self, ctx: &AdapterContext) -> Option<ToolInvocation> {
        let targets = scan_targets(&ctx.scope, |_| true)?;
        let log = ctx.output_dir.join(LOG_FILE);

        Some(
            ToolInvocation::new(self.settings.program_or("clamscan"), &ctx.repo_root)
                .args(["-r", "--infected", "--no-summary"])
                .arg(format!("--log={}", log.display()))
                .args(
                    ctx.excluded()
                        .map(|dir| format!("--exclude-dir={}", exclude_dir_pattern(&dir))),
                )
                .args(self.settings.extra_args.iter().cloned())
                .args(targets)
                .report(log),
        )
    }

    fn parse_report(
        &self,
        invocation: &ToolInvocation,
        _min_severity: SeverityLevel,
    ) -> CoreResult<ParsedReport> {
        let path = &invocation.reports[0];
        if !path.is_file() {
            return Ok(ParsedReport::default());
        }
        let bytes = std::fs::read(path)?;
        let log = String::from_utf8(bytes)
            .map_err(|_| CoreError::parse("clamscan log is not valid UTF-8"))?;

        Ok(ParsedReport {
            report_paths: invocation.existing_reports(),
            findings_count: Some(count_infected(&log)),
        })
    }
}
