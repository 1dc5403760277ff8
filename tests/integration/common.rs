//! Scripted adapters shared by the integration tests.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scan_cascade_core::{CoreError, CoreResult};
use scan_cascade_engine::adapters::{ParsedReport, ProcessOutput};
use scan_cascade_engine::{
    AdapterContext, AdapterRegistry, SeverityLevel, ToolAdapter, ToolInvocation, ToolName,
    ToolSettings,
};

// ============================================================================
// Scripted Adapter
// ============================================================================

/// Stands in for a real scanner: waits, optionally writes a report of the
/// form `{"findings": N}`, and exits with a fixed code.
#[derive(Debug, Clone)]
pub struct ScriptedAdapter {
    pub tool: ToolName,
    pub exit_code: i32,
    pub report: Option<String>,
    pub delay: Duration,
    pub nothing_to_scan: bool,
}

impl ScriptedAdapter {
    pub fn clean(tool: ToolName) -> Self {
        Self {
            tool,
            exit_code: 0,
            report: Some(r#"{"findings": 0}"#.to_string()),
            delay: Duration::from_millis(10),
            nothing_to_scan: false,
        }
    }

    pub fn findings(tool: ToolName, count: u64) -> Self {
        Self {
            exit_code: 1,
            report: Some(format!(r#"{{"findings": {}}}"#, count)),
            ..Self::clean(tool)
        }
    }

    pub fn crashing(tool: ToolName) -> Self {
        Self {
            exit_code: 2,
            report: None,
            ..Self::clean(tool)
        }
    }

    pub fn hanging(tool: ToolName) -> Self {
        Self {
            delay: Duration::from_secs(3600),
            ..Self::clean(tool)
        }
    }

    pub fn idle(tool: ToolName) -> Self {
        Self {
            nothing_to_scan: true,
            ..Self::clean(tool)
        }
    }
}

#[async_trait]
impl ToolAdapter for ScriptedAdapter {
    fn tool(&self) -> ToolName {
        self.tool
    }

    fn prepare(&self, ctx: &AdapterContext) -> Option<ToolInvocation> {
        if self.nothing_to_scan {
            return None;
        }
        Some(
            ToolInvocation::new("scripted", &ctx.repo_root)
                .report(ctx.output_dir.join(format!("{}.json", self.tool.as_str()))),
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
        let json: serde_json::Value = serde_json::from_slice(&std::fs::read(path)?)?;
        let count = json
            .get("findings")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| CoreError::parse("missing findings"))?;
        Ok(ParsedReport {
            report_paths: invocation.existing_reports(),
            findings_count: Some(count),
        })
    }

    async fn invoke(&self, invocation: &ToolInvocation) -> CoreResult<ProcessOutput> {
        tokio::time::sleep(self.delay).await;
        if let Some(report) = &self.report {
            tokio::fs::write(&invocation.reports[0], report).await?;
        }
        Ok(ProcessOutput {
            exit_code: Some(self.exit_code),
            stdout: String::new(),
            stderr: if self.exit_code > 1 {
                "scanner crashed".to_string()
            } else {
                String::new()
            },
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Registry with one scripted adapter per entry
pub fn registry(adapters: Vec<ScriptedAdapter>) -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    for adapter in adapters {
        let tool = adapter.tool;
        registry.register(
            tool,
            Box::new(move |_: &ToolSettings| Arc::new(adapter.clone()) as Arc<dyn ToolAdapter>),
        );
    }
    registry
}

/// Create a small repository tree to scan
pub fn create_repo(root: &Path) {
    std::fs::create_dir_all(root.join("src")).unwrap();
    std::fs::write(root.join("src/app.py"), "import os\nprint(os.getcwd())\n").unwrap();
    std::fs::write(root.join("requirements.txt"), "requests==2.0.0\n").unwrap();
}
