//! Scan Runner Integration Tests
//!
//! Runs complete scans (scope, schedule, aggregate, verdict, publish) against
//! a temporary repository with scripted adapters.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use scan_cascade::{FsArtifactStore, RunManifest, ScanConfig, ScanRunner};
use scan_cascade_core::{ArtifactStore, CoreError, CoreResult};
use scan_cascade_engine::{
    ScanRequest, ScopeMode, SeverityLevel, ToolName, ToolOutcome, ToolSettings,
};

use crate::common::{create_repo, registry, ScriptedAdapter};

// ============================================================================
// Helper Functions
// ============================================================================

fn request(tools: &[ToolName]) -> ScanRequest {
    ScanRequest::new(
        tools.iter().copied().collect::<BTreeSet<_>>(),
        ScopeMode::All,
        SeverityLevel::Medium,
    )
}

struct Fixture {
    repo: TempDir,
    artifacts: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let repo = TempDir::new().unwrap();
        create_repo(repo.path());
        Self {
            repo,
            artifacts: TempDir::new().unwrap(),
        }
    }

    fn config(&self) -> ScanConfig {
        ScanConfig {
            artifact_dir: self.artifacts.path().to_path_buf(),
            publish_retry_backoff_ms: 10,
            ..ScanConfig::default()
        }
    }

    fn runner(&self, config: ScanConfig, adapters: Vec<ScriptedAdapter>) -> ScanRunner {
        let store = Arc::new(FsArtifactStore::new(self.artifacts.path()));
        ScanRunner::new(self.repo.path(), config, store).with_registry(registry(adapters))
    }
}

/// Store that is never reachable
struct UnavailableStore;

#[async_trait]
impl ArtifactStore for UnavailableStore {
    async fn put(&self, _key: &str, _data: Vec<u8>) -> CoreResult<()> {
        Err(CoreError::internal("connection refused"))
    }

    fn location(&self, prefix: &str) -> String {
        format!("unreachable://{}", prefix)
    }
}

// ============================================================================
// End-to-End Scans
// ============================================================================

#[tokio::test]
async fn test_findings_from_one_tool_drive_the_verdict() {
    let fixture = Fixture::new();
    let runner = fixture.runner(
        fixture.config(),
        vec![
            ScriptedAdapter::clean(ToolName::Bandit),
            ScriptedAdapter::findings(ToolName::Semgrep, 3),
        ],
    );

    let outcome = runner
        .run(request(&[ToolName::Bandit, ToolName::Semgrep]).fail_on_findings(true))
        .await
        .unwrap();

    let results = &outcome.bundle.results;
    assert_eq!(results[&ToolName::Bandit].outcome, ToolOutcome::Succeeded);
    assert_eq!(results[&ToolName::Bandit].findings_count, Some(0));
    assert_eq!(results[&ToolName::Semgrep].outcome, ToolOutcome::FailedWithFindings);
    assert_eq!(results[&ToolName::Semgrep].findings_count, Some(3));

    assert!(outcome.verdict.has_findings);
    assert_eq!(
        outcome.verdict.contributing_tools,
        [ToolName::Semgrep].into_iter().collect()
    );
    assert_eq!(outcome.exit_code(), 1);

    // Scratch output is gone; the published copy is what remains.
    assert!(!outcome.bundle.combined_artifact_dir.exists());
    assert!(!runner.run_dir(&outcome.run_id).exists());

    let handle = outcome.artifact.as_ref().unwrap();
    assert_eq!(handle.file_count, 2);
    let run_dir = fixture.artifacts.path().join(&outcome.run_id);
    assert!(run_dir.join("semgrep/semgrep.json").is_file());
    assert!(run_dir.join("bandit/bandit.json").is_file());

    let manifest: RunManifest =
        serde_json::from_slice(&std::fs::read(run_dir.join("manifest.json")).unwrap()).unwrap();
    assert_eq!(manifest.verdict, outcome.verdict);
    assert_eq!(manifest.summary.total_tools, 2);
    assert_eq!(manifest.files.len(), 2);
}

#[tokio::test]
async fn test_skipped_tool_does_not_contribute() {
    let fixture = Fixture::new();
    let runner = fixture.runner(
        fixture.config(),
        vec![
            ScriptedAdapter::idle(ToolName::Clamav),
            ScriptedAdapter::clean(ToolName::Trivy),
        ],
    );

    let outcome = runner
        .run(request(&[ToolName::Clamav, ToolName::Trivy]).fail_on_findings(true))
        .await
        .unwrap();

    assert_eq!(outcome.bundle.results[&ToolName::Clamav].outcome, ToolOutcome::Skipped);
    assert!(!outcome.verdict.has_findings);
    assert_eq!(outcome.exit_code(), 0);
    assert!(!outcome.bundle.tool_dirs.contains_key(&ToolName::Clamav));
    let run_dir = fixture.artifacts.path().join(&outcome.run_id);
    assert!(run_dir.join("trivy/trivy.json").is_file());
    assert!(!run_dir.join("clamav").exists());
}

#[tokio::test]
async fn test_timed_out_tool_contributes_and_others_are_published() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.tools.insert(
        "trivy".to_string(),
        ToolSettings {
            timeout_secs: Some(1),
            ..ToolSettings::default()
        },
    );
    let runner = fixture.runner(
        config,
        vec![
            ScriptedAdapter::clean(ToolName::Bandit),
            ScriptedAdapter::clean(ToolName::Semgrep),
            ScriptedAdapter::hanging(ToolName::Trivy),
        ],
    );

    let outcome = runner
        .run(request(&[ToolName::Bandit, ToolName::Semgrep, ToolName::Trivy]))
        .await
        .unwrap();

    assert_eq!(outcome.bundle.results[&ToolName::Trivy].outcome, ToolOutcome::TimedOut);
    assert_eq!(outcome.bundle.results[&ToolName::Trivy].findings_count, None);
    assert_eq!(
        outcome.verdict.contributing_tools,
        [ToolName::Trivy].into_iter().collect()
    );

    let handle = outcome.artifact.as_ref().unwrap();
    assert_eq!(handle.file_count, 2);
    let run_dir = fixture.artifacts.path().join(&outcome.run_id);
    assert!(run_dir.join("bandit/bandit.json").is_file());
    assert!(run_dir.join("semgrep/semgrep.json").is_file());
    assert!(!run_dir.join("trivy").exists());
}

#[tokio::test]
async fn test_every_tool_failing_still_produces_a_verdict() {
    let fixture = Fixture::new();
    let runner = fixture.runner(
        fixture.config(),
        ToolName::ALL.into_iter().map(ScriptedAdapter::crashing).collect(),
    );

    let outcome = runner.run(request(&ToolName::ALL)).await.unwrap();

    assert_eq!(outcome.summary.failed, 4);
    assert!(outcome
        .bundle
        .results
        .values()
        .all(|result| result.outcome == ToolOutcome::FailedExecution
            && result.findings_count.is_none()));
    assert_eq!(
        outcome.verdict.contributing_tools,
        ToolName::ALL.into_iter().collect()
    );
    assert_eq!(outcome.artifact.as_ref().unwrap().file_count, 0);
    assert_eq!(outcome.exit_code(), 0);
}

#[tokio::test]
async fn test_unregistered_tool_is_a_failed_execution() {
    let fixture = Fixture::new();
    let runner = fixture.runner(
        fixture.config(),
        vec![ScriptedAdapter::clean(ToolName::Bandit)],
    );

    let outcome = runner
        .run(request(&[ToolName::Bandit, ToolName::Clamav]))
        .await
        .unwrap();

    assert_eq!(
        outcome.bundle.results.keys().copied().collect::<Vec<_>>(),
        vec![ToolName::Bandit, ToolName::Clamav]
    );
    assert_eq!(
        outcome.bundle.results[&ToolName::Clamav].outcome,
        ToolOutcome::FailedExecution
    );
    assert!(outcome.verdict.has_findings);
}

#[tokio::test]
async fn test_repeated_runs_leave_no_scratch_in_the_repository() {
    let fixture = Fixture::new();
    let runner = fixture.runner(
        fixture.config(),
        vec![
            ScriptedAdapter::findings(ToolName::Bandit, 1),
            ScriptedAdapter::clean(ToolName::Trivy),
        ],
    );

    for _ in 0..3 {
        let outcome = runner
            .run(request(&[ToolName::Bandit, ToolName::Trivy]))
            .await
            .unwrap();
        assert_eq!(outcome.artifact.as_ref().unwrap().file_count, 2);
    }

    let work_dir = fixture.repo.path().join(".scan-cascade/work");
    let leftover = std::fs::read_dir(&work_dir)
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftover, 0);
}

#[tokio::test]
async fn test_publish_failure_does_not_mask_the_verdict() {
    let fixture = Fixture::new();
    let runner = ScanRunner::new(
        fixture.repo.path(),
        fixture.config(),
        Arc::new(UnavailableStore),
    )
    .with_registry(registry(vec![ScriptedAdapter::findings(ToolName::Semgrep, 1)]));

    let outcome = runner.run(request(&[ToolName::Semgrep])).await.unwrap();
    assert!(outcome.artifact.is_none());
    assert!(outcome.publish_error.as_ref().unwrap().contains("after retry"));
    assert!(outcome.verdict.has_findings);
    assert_eq!(outcome.exit_code(), 3);

    // The findings exit takes precedence over the publish failure.
    let outcome = runner
        .run(request(&[ToolName::Semgrep]).fail_on_findings(true))
        .await
        .unwrap();
    assert_eq!(outcome.exit_code(), 1);
}
