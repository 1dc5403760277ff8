//! Published Run Models
//!
//! The manifest written next to every published bundle and the handle
//! returned to the caller.

use chrono::{DateTime, Utc};
use scan_cascade_engine::{ScanSummary, Verdict};
use serde::{Deserialize, Serialize};

/// Name of the manifest stored at `<run_id>/manifest.json`
pub const MANIFEST_FILE: &str = "manifest.json";

/// One stored artifact file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    /// Store key (`<run_id>/<tool>/<file>`)
    pub key: String,
    /// Hex-encoded SHA-256 of the file contents
    pub sha256: String,
    /// Size in bytes
    pub size: u64,
}

/// Manifest describing one published run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunManifest {
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    /// After this instant the run may be purged
    pub expires_at: DateTime<Utc>,
    pub verdict: Verdict,
    pub summary: ScanSummary,
    pub files: Vec<ManifestEntry>,
}

impl RunManifest {
    /// Store key of this run's manifest
    pub fn key(run_id: &str) -> String {
        format!("{}/{}", run_id, MANIFEST_FILE)
    }

    /// Whether the run's retention window has passed at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Where a published bundle ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactHandle {
    pub run_id: String,
    /// Store-specific location (directory path or URI)
    pub location: String,
    pub expires_at: DateTime<Utc>,
    /// Number of artifact files stored, excluding the manifest
    pub file_count: usize,
}
