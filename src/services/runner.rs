//! Scan Execution Orchestrator
//!
//! Runs one scan end to end: resolve scope, schedule the tools, aggregate,
//! decide the verdict, publish. Only a scope resolution failure (with the
//! `abort` fallback) ends a run early. A publish failure is recorded on the
//! outcome next to the verdict instead of replacing it.
//!
//! Each run's scratch directory is removed once publishing has finished.
//! The work and artifact directories are excluded from every tool's scan.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use scan_cascade_core::ArtifactStore;
use scan_cascade_engine::{
    AdapterRegistry, AggregatedBundle, ResultAggregator, ScanRequest, ScanSummary, Scheduler,
    SchedulerConfig, Scope, ScopeMode, ScopeResolver, Verdict, VerdictEngine,
};
use tokio_util::sync::CancellationToken;

use crate::models::config::{ScanConfig, ScopeFallback};
use crate::models::manifest::ArtifactHandle;
use crate::services::publisher::{ArtifactPublisher, RetentionPolicy};
use crate::utils::error::AppResult;
use crate::utils::paths::resolve_under;

/// Everything a finished scan produced
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub run_id: String,
    pub request: ScanRequest,
    /// Scope the tools actually ran against (after any fallback)
    pub scope: Scope,
    pub verdict: Verdict,
    pub summary: ScanSummary,
    pub bundle: AggregatedBundle,
    /// Published location, when publishing succeeded
    pub artifact: Option<ArtifactHandle>,
    /// Publish failure message, when publishing failed after its retry
    pub publish_error: Option<String>,
}

impl ScanOutcome {
    /// Whether the caller asked to fail on findings and there are some
    pub fn fails_on_findings(&self) -> bool {
        self.request.fail_on_findings && self.verdict.has_findings
    }

    /// Process exit code: 1 for failing findings, else 3 for a failed publish
    pub fn exit_code(&self) -> u8 {
        if self.fails_on_findings() {
            1
        } else if self.publish_error.is_some() {
            3
        } else {
            0
        }
    }

    /// `key=value` lines for a CI step output file
    pub fn step_outputs(&self) -> Vec<(&'static str, String)> {
        let contributing: Vec<&str> = self
            .verdict
            .contributing_tools
            .iter()
            .map(|tool| tool.as_str())
            .collect();
        vec![
            ("has_findings", self.verdict.has_findings.to_string()),
            ("contributing_tools", contributing.join(",")),
            (
                "artifact_location",
                self.artifact
                    .as_ref()
                    .map(|handle| handle.location.clone())
                    .unwrap_or_default(),
            ),
        ]
    }

    /// Append `step_outputs` to a CI step output file
    pub fn write_step_outputs(&self, path: &Path) -> std::io::Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        for (key, value) in self.step_outputs() {
            writeln!(file, "{}={}", key, value)?;
        }
        Ok(())
    }
}

/// Scan runner - orchestrates one scan over a repository
pub struct ScanRunner {
    /// Canonical repository root
    repo_root: PathBuf,
    config: ScanConfig,
    registry: Arc<AdapterRegistry>,
    store: Arc<dyn ArtifactStore>,
    cancel: CancellationToken,
}

impl ScanRunner {
    /// Create a runner with the built-in adapters
    pub fn new(
        repo_root: impl AsRef<Path>,
        config: ScanConfig,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            repo_root: repo_root.as_ref().to_path_buf(),
            config,
            registry: Arc::new(AdapterRegistry::with_defaults()),
            store,
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the adapter registry
    pub fn with_registry(mut self, registry: AdapterRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Token that cancels the running schedule; pending tools become `TIMED_OUT`
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scratch directory for one run
    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        resolve_under(&self.repo_root, &self.config.work_dir).join(run_id)
    }

    /// Run one scan.
    pub async fn run(&self, request: ScanRequest) -> AppResult<ScanOutcome> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let run_dir = self.run_dir(&run_id);
        tracing::info!(
            run_id = %run_id,
            tools = request.tools.len(),
            scope = %request.scope,
            min_severity = %request.min_severity,
            "starting scan"
        );

        let scope = self.resolve_scope(request.scope).await?;

        let scheduler = Scheduler::new(
            Arc::clone(&self.registry),
            SchedulerConfig::new(&self.repo_root, run_dir.join("tools"))
                .with_global_budget(self.config.global_timeout())
                .with_tool_timeout(self.config.tool_timeout())
                .with_excluded_dirs(self.config.excluded_dirs(&self.repo_root)),
        )
        .with_tool_settings(self.config.tool_settings())
        .with_cancellation_token(self.cancel.clone());

        let results = scheduler
            .schedule(&request.tools, &scope, request.min_severity)
            .await;

        let combined_dir = run_dir.join("combined");
        let bundle = match ResultAggregator::new(&combined_dir)
            .aggregate(results.clone())
            .await
        {
            Ok(bundle) => bundle,
            Err(e) => {
                tracing::error!("failed to build combined artifact directory: {}", e);
                AggregatedBundle {
                    results,
                    combined_artifact_dir: combined_dir,
                    tool_dirs: Default::default(),
                }
            }
        };

        let verdict = VerdictEngine::new(self.config.skipped_policy).decide(&bundle, &request);
        let summary = bundle.summary();
        tracing::info!(
            run_id = %run_id,
            has_findings = verdict.has_findings,
            contributing = verdict.contributing_tools.len(),
            "verdict decided"
        );

        let publisher = ArtifactPublisher::new(Arc::clone(&self.store))
            .with_retry_backoff(self.config.publish_retry_backoff());
        let retention = RetentionPolicy::days(self.config.retention_days);
        let (artifact, publish_error) = match publisher
            .publish(&run_id, &bundle, &verdict, &retention)
            .await
        {
            Ok(handle) => (Some(handle), None),
            Err(e) => {
                tracing::error!(run_id = %run_id, "failed to publish artifacts: {}", e);
                (None, Some(e.to_string()))
            }
        };

        if let Err(e) = tokio::fs::remove_dir_all(&run_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    run_id = %run_id,
                    "failed to remove scratch directory {}: {}",
                    run_dir.display(),
                    e
                );
            }
        }

        Ok(ScanOutcome {
            run_id,
            request,
            scope,
            verdict,
            summary,
            bundle,
            artifact,
            publish_error,
        })
    }

    async fn resolve_scope(&self, mode: ScopeMode) -> AppResult<Scope> {
        let resolver =
            ScopeResolver::new(&self.repo_root).with_base_ref(self.config.base_ref.clone());
        match resolver.resolve(mode).await {
            Ok(scope) => Ok(scope),
            Err(e) if self.config.scope_fallback == ScopeFallback::All => {
                tracing::warn!("{}; falling back to a whole-tree scan", e);
                Ok(Scope::all())
            }
            Err(e) => Err(e.into()),
        }
    }
}
