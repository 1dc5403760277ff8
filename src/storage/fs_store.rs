//! Filesystem Artifact Store
//!
//! Stores published bundles under a root directory, one subdirectory per run.
//! Retention is enforced by `purge_expired`, which reads each run's manifest.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scan_cascade_core::{validate_key, ArtifactStore, CoreResult};

use crate::models::manifest::{RunManifest, MANIFEST_FILE};
use crate::utils::error::AppResult;

/// Artifact store rooted at a local directory
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        key.split('/').fold(self.root.clone(), |path, segment| path.join(segment))
    }

    /// Delete every run whose manifest says it expired at or before `now`.
    ///
    /// Returns the purged run ids in order. Directories without a readable
    /// manifest are left in place.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> AppResult<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut run_dirs = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                run_dirs.push(entry.path());
            }
        }
        run_dirs.sort();

        let mut purged = Vec::new();
        for dir in run_dirs {
            let manifest_path = dir.join(MANIFEST_FILE);
            let manifest: RunManifest = match tokio::fs::read(&manifest_path).await {
                Ok(bytes) => match serde_json::from_slice(&bytes) {
                    Ok(manifest) => manifest,
                    Err(e) => {
                        tracing::warn!(
                            path = %manifest_path.display(),
                            "unreadable manifest: {}",
                            e
                        );
                        continue;
                    }
                },
                Err(_) => {
                    tracing::debug!(dir = %dir.display(), "no manifest, leaving directory alone");
                    continue;
                }
            };

            if manifest.is_expired(now) {
                tokio::fs::remove_dir_all(&dir).await?;
                tracing::info!(run_id = %manifest.run_id, "purged expired artifacts");
                purged.push(manifest.run_id);
            }
        }

        Ok(purged)
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> CoreResult<()> {
        validate_key(key)?;
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write then rename so a reader never sees a partial file.
        let tmp = path.with_extension("partial");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    fn location(&self, prefix: &str) -> String {
        self.path_for(prefix).display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use scan_cascade_engine::{ScanSummary, Verdict};

    async fn write_manifest(store: &FsArtifactStore, run_id: &str, expires_at: DateTime<Utc>) {
        let manifest = RunManifest {
            run_id: run_id.to_string(),
            created_at: expires_at - chrono::Duration::days(1),
            expires_at,
            verdict: Verdict::default(),
            summary: ScanSummary::from_results(&BTreeMap::new()),
            files: Vec::new(),
        };
        store
            .put(&RunManifest::key(run_id), serde_json::to_vec(&manifest).unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_put_writes_nested_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());

        store
            .put("run-1/semgrep/semgrep.sarif", b"{}".to_vec())
            .await
            .unwrap();

        let written = dir.path().join("run-1/semgrep/semgrep.sarif");
        assert_eq!(std::fs::read(&written).unwrap(), b"{}");
        assert!(!dir.path().join("run-1/semgrep/semgrep.partial").exists());
        assert_eq!(
            store.location("run-1"),
            dir.path().join("run-1").display().to_string()
        );
    }

    #[tokio::test]
    async fn test_put_rejects_escaping_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        assert!(store.put("../outside", Vec::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_purge_expired_only_removes_expired_runs() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let now = Utc::now();

        write_manifest(&store, "old", now - chrono::Duration::hours(1)).await;
        store.put("old/bandit/bandit.json", b"{}".to_vec()).await.unwrap();
        write_manifest(&store, "fresh", now + chrono::Duration::days(10)).await;
        std::fs::create_dir_all(dir.path().join("unmanaged")).unwrap();

        let purged = store.purge_expired(now).await.unwrap();
        assert_eq!(purged, vec!["old".to_string()]);
        assert!(!dir.path().join("old").exists());
        assert!(dir.path().join("fresh").exists());
        assert!(dir.path().join("unmanaged").exists());
    }

    #[tokio::test]
    async fn test_purge_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path().join("never-created"));
        assert!(store.purge_expired(Utc::now()).await.unwrap().is_empty());
    }
}
