//! Artifact Store Integration Tests
//!
//! Publishing into the filesystem store and enforcing retention.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tempfile::TempDir;

use scan_cascade::utils::paths::{config_path, resolve_under};
use scan_cascade::{ConfigService, FsArtifactStore, ScanRunner};
use scan_cascade_engine::{ScanRequest, ScopeMode, SeverityLevel, ToolName};

use crate::common::{create_repo, registry, ScriptedAdapter};

fn write_config(repo: &TempDir, body: &str) {
    std::fs::write(repo.path().join("scan-cascade.toml"), body).unwrap();
}

#[tokio::test]
async fn test_retention_from_config_file_is_enforced_by_purge() {
    let repo = TempDir::new().unwrap();
    create_repo(repo.path());
    write_config(
        &repo,
        r#"
artifact_dir = "published"
retention_days = 1
publish_retry_backoff_ms = 10
"#,
    );

    let config = ConfigService::load(config_path(repo.path(), None))
        .unwrap()
        .get_config_clone();
    assert_eq!(config.retention_days, 1);

    let artifact_root = resolve_under(repo.path(), &config.artifact_dir);
    let store = Arc::new(FsArtifactStore::new(&artifact_root));
    let runner = ScanRunner::new(repo.path(), config, store.clone())
        .with_registry(registry(vec![ScriptedAdapter::findings(ToolName::Bandit, 2)]));

    let request = ScanRequest::new(
        [ToolName::Bandit].into_iter().collect(),
        ScopeMode::All,
        SeverityLevel::Low,
    );
    let outcome = runner.run(request).await.unwrap();
    let handle = outcome.artifact.unwrap();
    assert_eq!(handle.location, artifact_root.join(&handle.run_id).display().to_string());
    assert!(artifact_root.join(&handle.run_id).join("bandit/bandit.json").is_file());

    // Still inside the retention window.
    assert!(store.purge_expired(Utc::now()).await.unwrap().is_empty());
    assert!(artifact_root.join(&handle.run_id).exists());

    let purged = store
        .purge_expired(Utc::now() + Duration::days(2))
        .await
        .unwrap();
    assert_eq!(purged, vec![handle.run_id.clone()]);
    assert!(!artifact_root.join(&handle.run_id).exists());
}

#[tokio::test]
async fn test_runs_are_isolated_by_run_id() {
    let repo = TempDir::new().unwrap();
    let artifacts = TempDir::new().unwrap();
    create_repo(repo.path());

    let config = scan_cascade::ScanConfig {
        artifact_dir: artifacts.path().to_path_buf(),
        ..Default::default()
    };
    let runner = ScanRunner::new(
        repo.path(),
        config,
        Arc::new(FsArtifactStore::new(artifacts.path())),
    )
    .with_registry(registry(vec![ScriptedAdapter::clean(ToolName::Semgrep)]));

    let request = ScanRequest::new(
        [ToolName::Semgrep].into_iter().collect(),
        ScopeMode::All,
        SeverityLevel::High,
    );
    let first = runner.run(request.clone()).await.unwrap();
    let second = runner.run(request).await.unwrap();

    assert_ne!(first.run_id, second.run_id);
    for run_id in [&first.run_id, &second.run_id] {
        assert!(artifacts.path().join(run_id).join("manifest.json").is_file());
        assert!(artifacts.path().join(run_id).join("semgrep/semgrep.json").is_file());
    }
}
