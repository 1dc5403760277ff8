//! Artifact Publisher
//!
//! Persists an aggregated bundle into an `ArtifactStore` under a retention
//! policy. Files are stored as `<run_id>/<tool>/<file>`; `manifest.json` is
//! written last so a run with a manifest is always complete.
//!
//! A failed upload is retried once after a backoff. A second failure is
//! surfaced as `CoreError::Publish`; the verdict has already been computed by
//! then and is not affected.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use scan_cascade_core::{ArtifactStore, CoreError, CoreResult};
use scan_cascade_engine::{AggregatedBundle, Verdict};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::models::manifest::{ArtifactHandle, ManifestEntry, RunManifest};

/// How long published artifacts are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub retention: chrono::Duration,
}

impl RetentionPolicy {
    pub fn days(days: u32) -> Self {
        Self {
            retention: chrono::Duration::days(i64::from(days)),
        }
    }

    /// Expiry instant for a run created at `created_at`
    pub fn expires_at(&self, created_at: DateTime<Utc>) -> DateTime<Utc> {
        created_at + self.retention
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::days(30)
    }
}

/// An artifact file read from the combined directory, ready to upload
struct PendingFile {
    key: String,
    data: Vec<u8>,
}

/// Publishes bundles to a backing store
pub struct ArtifactPublisher {
    store: Arc<dyn ArtifactStore>,
    retry_backoff: Duration,
}

impl ArtifactPublisher {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            store,
            retry_backoff: Duration::from_secs(2),
        }
    }

    /// Set the delay before the single retry
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Publish `bundle` for `run_id`.
    pub async fn publish(
        &self,
        run_id: &str,
        bundle: &AggregatedBundle,
        verdict: &Verdict,
        retention: &RetentionPolicy,
    ) -> CoreResult<ArtifactHandle> {
        let files = collect_files(run_id, bundle).await?;
        let created_at = Utc::now();
        let expires_at = retention.expires_at(created_at);

        let manifest = RunManifest {
            run_id: run_id.to_string(),
            created_at,
            expires_at,
            verdict: verdict.clone(),
            summary: bundle.summary(),
            files: files
                .iter()
                .map(|file| ManifestEntry {
                    key: file.key.clone(),
                    sha256: compute_sha256(&file.data),
                    size: file.data.len() as u64,
                })
                .collect(),
        };
        let manifest_bytes = encode_json(&manifest, "manifest")?;

        if let Err(first) = self.upload(run_id, &files, &manifest_bytes).await {
            tracing::warn!(
                run_id = %run_id,
                backoff_ms = self.retry_backoff.as_millis() as u64,
                "artifact upload failed, retrying once: {}",
                first
            );
            tokio::time::sleep(self.retry_backoff).await;
            self.upload(run_id, &files, &manifest_bytes)
                .await
                .map_err(|e| CoreError::publish(format!("upload failed after retry: {}", e)))?;
        }

        let handle = ArtifactHandle {
            run_id: run_id.to_string(),
            location: self.store.location(run_id),
            expires_at,
            file_count: files.len(),
        };
        tracing::info!(
            run_id = %run_id,
            location = %handle.location,
            files = handle.file_count,
            "published scan artifacts"
        );
        Ok(handle)
    }

    async fn upload(&self, run_id: &str, files: &[PendingFile], manifest: &[u8]) -> CoreResult<()> {
        for file in files {
            self.store.put(&file.key, file.data.clone()).await?;
        }
        self.store.put(&RunManifest::key(run_id), manifest.to_vec()).await
    }
}

/// Read every file under each tool directory of the bundle, in key order.
async fn collect_files(run_id: &str, bundle: &AggregatedBundle) -> CoreResult<Vec<PendingFile>> {
    let mut files = Vec::new();
    for (tool, dir) in &bundle.tool_dirs {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| CoreError::publish(format!("cannot read {}: {}", dir.display(), e)))?;

        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CoreError::publish(format!("cannot read {}: {}", dir.display(), e)))?
        {
            if entry.path().is_file() {
                paths.push(entry.path());
            }
        }
        paths.sort();

        for path in paths {
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            let data = tokio::fs::read(&path)
                .await
                .map_err(|e| CoreError::publish(format!("cannot read {}: {}", path.display(), e)))?;
            files.push(PendingFile {
                key: format!("{}/{}/{}", run_id, tool.as_str(), name),
                data,
            });
        }
    }
    Ok(files)
}

/// Pretty JSON for upload; an encoding failure is a publish failure.
fn encode_json<T: Serialize>(value: &T, what: &str) -> CoreResult<Vec<u8>> {
    serde_json::to_vec_pretty(value)
        .map_err(|e| CoreError::publish(format!("cannot encode {}: {}", what, e)))
}

/// Compute SHA-256 of `data`, returning the full hex string.
pub fn compute_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
