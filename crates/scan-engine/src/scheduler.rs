//! Concurrent Scan Scheduler
//!
//! Launches one task per requested tool on a `JoinSet` and joins them at a
//! single barrier. Every failure mode of an adapter (error, panic, per-tool
//! timeout, global budget) is converted into a `ToolResult`, so the returned
//! mapping always has exactly the requested keys.
//!
//! When the global budget runs out the scheduler signals cancellation, aborts
//! the remaining tasks without waiting for them, and records those tools as
//! `TimedOut`. Aborting drops the adapter futures, which kills their child
//! processes.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::adapters::{AdapterContext, AdapterRegistry, ToolSettings};
use crate::models::{Scope, SeverityLevel, ToolName, ToolResult};

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Repository root every adapter runs in
    pub repo_root: PathBuf,
    /// Directory holding one isolated output directory per tool
    pub work_dir: PathBuf,
    /// Wall-clock budget for the whole schedule
    pub global_budget: Duration,
    /// Default per-tool timeout
    pub tool_timeout: Duration,
    /// Directories under the repository root that tools must not scan
    pub excluded_dirs: Vec<PathBuf>,
}

impl SchedulerConfig {
    /// Create a config with a 30 minute budget and 15 minute per-tool timeout
    pub fn new(repo_root: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            work_dir: work_dir.into(),
            global_budget: Duration::from_secs(1800),
            tool_timeout: Duration::from_secs(900),
            excluded_dirs: Vec::new(),
        }
    }

    /// Set the global budget
    pub fn with_global_budget(mut self, budget: Duration) -> Self {
        self.global_budget = budget;
        self
    }

    /// Set the default per-tool timeout
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Keep tools out of these repository-relative directories
    pub fn with_excluded_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.excluded_dirs = dirs;
        self
    }
}

/// Runs the selected adapters concurrently and collects one result per tool.
pub struct Scheduler {
    registry: Arc<AdapterRegistry>,
    settings: BTreeMap<ToolName, ToolSettings>,
    config: SchedulerConfig,
    cancel: CancellationToken,
}

impl Scheduler {
    /// Create a scheduler
    pub fn new(registry: Arc<AdapterRegistry>, config: SchedulerConfig) -> Self {
        Self {
            registry,
            settings: BTreeMap::new(),
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Set per-tool settings
    pub fn with_tool_settings(mut self, settings: BTreeMap<ToolName, ToolSettings>) -> Self {
        self.settings = settings;
        self
    }

    /// Share an existing cancellation token
    pub fn with_cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels every in-flight schedule (e.g. on Ctrl-C)
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Get the scheduler configuration
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Output directory assigned to `tool`
    pub fn output_dir(&self, tool: ToolName) -> PathBuf {
        self.config.work_dir.join(tool.as_str())
    }

    /// Run every tool in `requested` and return exactly one result per tool.
    pub async fn schedule(
        &self,
        requested: &BTreeSet<ToolName>,
        scope: &Scope,
        min_severity: SeverityLevel,
    ) -> BTreeMap<ToolName, ToolResult> {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.config.global_budget;
        let scope = Arc::new(scope.clone());
        let cancel = self.cancel.child_token();

        let mut results = BTreeMap::new();
        let mut tasks = JoinSet::new();

        for &tool in requested {
            let settings = self.settings.get(&tool).cloned().unwrap_or_default();
            let Some(adapter) = self.registry.build(tool, &settings) else {
                tracing::warn!(tool = %tool, "no adapter registered");
                results.insert(
                    tool,
                    ToolResult::execution_failed(tool, "no adapter registered", 0),
                );
                continue;
            };

            let ctx = AdapterContext {
                repo_root: self.config.repo_root.clone(),
                scope: Arc::clone(&scope),
                min_severity,
                output_dir: self.output_dir(tool),
                excluded_dirs: self.config.excluded_dirs.clone(),
            };
            let timeout = settings.timeout_or(self.config.tool_timeout);
            let cancel = cancel.clone();

            tracing::info!(tool = %tool, timeout_secs = timeout.as_secs(), "launching tool");

            tasks.spawn(async move {
                let task_start = Instant::now();
                let run = AssertUnwindSafe(adapter.run(&ctx, timeout)).catch_unwind();
                let mut result = tokio::select! {
                    outcome = run => match outcome {
                        Ok(result) => result,
                        Err(panic) => ToolResult::execution_failed(
                            tool,
                            format!("adapter panicked: {}", panic_message(panic.as_ref())),
                            task_start.elapsed().as_millis() as u64,
                        ),
                    },
                    _ = cancel.cancelled() => {
                        ToolResult::timed_out(tool, task_start.elapsed().as_millis() as u64)
                            .with_message("cancelled before completion")
                    }
                };
                result.tool = tool;
                (tool, result)
            });
        }

        let mut budget_exceeded = false;
        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((tool, result)))) => {
                    tracing::info!(
                        tool = %tool,
                        outcome = %result.outcome,
                        duration_ms = result.duration_ms,
                        "tool finished"
                    );
                    results.insert(tool, result);
                }
                Ok(Some(Err(e))) => {
                    tracing::warn!("scan task ended without a result: {}", e);
                }
                Ok(None) => break,
                Err(_) => {
                    budget_exceeded = true;
                    tracing::warn!(
                        budget_secs = self.config.global_budget.as_secs(),
                        pending = tasks.len(),
                        "global scan budget exceeded; abandoning remaining tools"
                    );
                    cancel.cancel();
                    tasks.abort_all();
                    break;
                }
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        for &tool in requested {
            results.entry(tool).or_insert_with(|| {
                if budget_exceeded {
                    ToolResult::timed_out(tool, elapsed_ms)
                        .with_message("abandoned after the global scan budget")
                } else {
                    ToolResult::execution_failed(
                        tool,
                        "scan task ended without a result",
                        elapsed_ms,
                    )
                }
            });
        }

        results
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scan_cascade_core::CoreResult;

    use crate::adapters::{ParsedReport, ToolAdapter, ToolInvocation};
    use crate::models::ToolOutcome;

    /// Fake adapter whose `run` returns a canned outcome after a delay.
    struct FakeAdapter {
        tool: ToolName,
        behavior: Behavior,
    }

    #[derive(Clone, Copy)]
    enum Behavior {
        Clean,
        Findings,
        Hang,
        Panic,
    }

    #[async_trait]
    impl ToolAdapter for FakeAdapter {
        fn tool(&self) -> ToolName {
            self.tool
        }

        fn prepare(&self, _ctx: &AdapterContext) -> Option<ToolInvocation> {
            None
        }

        fn parse_report(
            &self,
            _invocation: &ToolInvocation,
            _min_severity: SeverityLevel,
        ) -> CoreResult<ParsedReport> {
            Ok(ParsedReport::default())
        }

        async fn run(&self, _ctx: &AdapterContext, _timeout: Duration) -> ToolResult {
            match self.behavior {
                Behavior::Clean => {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    ToolResult::succeeded(self.tool, BTreeSet::new(), 0, 10)
                }
                Behavior::Findings => {
                    ToolResult::with_findings(self.tool, BTreeSet::new(), Some(2), 5)
                }
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    ToolResult::succeeded(self.tool, BTreeSet::new(), 0, 0)
                }
                Behavior::Panic => panic!("scanner exploded"),
            }
        }
    }

    fn registry(behaviors: &[(ToolName, Behavior)]) -> Arc<AdapterRegistry> {
        let mut registry = AdapterRegistry::new();
        for &(tool, behavior) in behaviors {
            registry.register(
                tool,
                Box::new(move |_: &ToolSettings| {
                    Arc::new(FakeAdapter { tool, behavior }) as Arc<dyn ToolAdapter>
                }),
            );
        }
        Arc::new(registry)
    }

    fn scheduler(registry: Arc<AdapterRegistry>) -> Scheduler {
        let config = SchedulerConfig::new("/repo", "/tmp/scan-cascade-test")
            .with_global_budget(Duration::from_secs(60))
            .with_tool_timeout(Duration::from_secs(30));
        Scheduler::new(registry, config)
    }

    fn all_clean() -> Arc<AdapterRegistry> {
        registry(&[
            (ToolName::Bandit, Behavior::Clean),
            (ToolName::Semgrep, Behavior::Clean),
            (ToolName::Trivy, Behavior::Clean),
            (ToolName::Clamav, Behavior::Clean),
        ])
    }

    #[tokio::test]
    async fn test_schedule_keys_equal_every_requested_subset() {
        let scheduler = scheduler(all_clean());
        for mask in 0u8..16 {
            let requested: BTreeSet<ToolName> = ToolName::ALL
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, tool)| *tool)
                .collect();
            let results = scheduler
                .schedule(&requested, &Scope::all(), SeverityLevel::Low)
                .await;
            let keys: BTreeSet<ToolName> = results.keys().copied().collect();
            assert_eq!(keys, requested);
        }
    }

    #[tokio::test]
    async fn test_schedule_empty_request() {
        let results = scheduler(all_clean())
            .schedule(&BTreeSet::new(), &Scope::all(), SeverityLevel::High)
            .await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_panicking_adapter_is_isolated() {
        let registry = registry(&[
            (ToolName::Bandit, Behavior::Panic),
            (ToolName::Semgrep, Behavior::Findings),
            (ToolName::Trivy, Behavior::Clean),
        ]);
        let requested: BTreeSet<_> = [ToolName::Bandit, ToolName::Semgrep, ToolName::Trivy]
            .into_iter()
            .collect();
        let results = scheduler(registry)
            .schedule(&requested, &Scope::all(), SeverityLevel::Low)
            .await;

        assert_eq!(results[&ToolName::Bandit].outcome, ToolOutcome::FailedExecution);
        assert!(results[&ToolName::Bandit]
            .message
            .as_deref()
            .unwrap()
            .contains("scanner exploded"));
        assert_eq!(results[&ToolName::Semgrep].outcome, ToolOutcome::FailedWithFindings);
        assert_eq!(results[&ToolName::Trivy].outcome, ToolOutcome::Succeeded);
    }

    #[tokio::test]
    async fn test_unregistered_tool_fails_without_blocking_others() {
        let registry = registry(&[(ToolName::Trivy, Behavior::Clean)]);
        let requested: BTreeSet<_> = [ToolName::Clamav, ToolName::Trivy].into_iter().collect();
        let results = scheduler(registry)
            .schedule(&requested, &Scope::all(), SeverityLevel::Low)
            .await;

        assert_eq!(results[&ToolName::Clamav].outcome, ToolOutcome::FailedExecution);
        assert_eq!(results[&ToolName::Trivy].outcome, ToolOutcome::Succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_budget_marks_stragglers_timed_out() {
        let registry = registry(&[
            (ToolName::Bandit, Behavior::Clean),
            (ToolName::Semgrep, Behavior::Findings),
            (ToolName::Clamav, Behavior::Hang),
        ]);
        let config = SchedulerConfig::new("/repo", "/tmp/scan-cascade-test")
            .with_global_budget(Duration::from_secs(5));
        let scheduler = Scheduler::new(registry, config);
        let requested: BTreeSet<_> = [ToolName::Bandit, ToolName::Semgrep, ToolName::Clamav]
            .into_iter()
            .collect();

        let results = scheduler
            .schedule(&requested, &Scope::all(), SeverityLevel::Low)
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[&ToolName::Bandit].outcome, ToolOutcome::Succeeded);
        assert_eq!(results[&ToolName::Semgrep].outcome, ToolOutcome::FailedWithFindings);
        assert_eq!(results[&ToolName::Clamav].outcome, ToolOutcome::TimedOut);
        assert!(results[&ToolName::Clamav].findings_count.is_none());
    }

    #[tokio::test]
    async fn test_external_cancellation_reports_timed_out() {
        let registry = registry(&[(ToolName::Trivy, Behavior::Hang)]);
        let scheduler = scheduler(registry);
        let token = scheduler.cancellation_token();
        let requested: BTreeSet<_> = [ToolName::Trivy].into_iter().collect();
        let scope = Scope::all();

        let cancel_soon = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        };
        let (results, _) = tokio::join!(
            scheduler.schedule(&requested, &scope, SeverityLevel::Low),
            cancel_soon
        );

        assert_eq!(results[&ToolName::Trivy].outcome, ToolOutcome::TimedOut);
    }

    #[test]
    fn test_output_dirs_are_isolated_per_tool() {
        let scheduler = scheduler(all_clean());
        let dirs: BTreeSet<PathBuf> = ToolName::ALL
            .iter()
            .map(|tool| scheduler.output_dir(*tool))
            .collect();
        assert_eq!(dirs.len(), ToolName::ALL.len());
    }
}
