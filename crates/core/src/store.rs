//! Artifact Store Abstraction
//!
//! Key-value storage for published scan artifacts. Keys are `/`-separated
//! relative paths (`<run_id>/<tool>/<file>`). The application crate provides a
//! filesystem-backed implementation; `InMemoryArtifactStore` backs tests and
//! dry runs.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{CoreError, CoreResult};

/// Backing store for published artifact bundles.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `data` under `key`, replacing any previous value.
    async fn put(&self, key: &str, data: Vec<u8>) -> CoreResult<()>;

    /// Human-readable location of everything stored under `prefix`.
    fn location(&self, prefix: &str) -> String;
}

/// Reject keys that could escape the store root.
pub fn validate_key(key: &str) -> CoreResult<()> {
    if key.is_empty() {
        return Err(CoreError::validation("artifact key is empty"));
    }
    if key.starts_with('/') || key.contains('\\') {
        return Err(CoreError::validation(format!(
            "artifact key must be relative: {}",
            key
        )));
    }
    if key.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..") {
        return Err(CoreError::validation(format!(
            "artifact key has an invalid segment: {}",
            key
        )));
    }
    Ok(())
}

/// In-memory artifact store.
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryArtifactStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a stored object by key
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects
            .read()
            .ok()
            .and_then(|objects| objects.get(key).cloned())
    }

    /// All stored keys in order
    pub fn keys(&self) -> Vec<String> {
        self.objects
            .read()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> CoreResult<()> {
        validate_key(key)?;
        let mut objects = self
            .objects
            .write()
            .map_err(|_| CoreError::internal("artifact store lock poisoned"))?;
        objects.insert(key.to_string(), data);
        Ok(())
    }

    fn location(&self, prefix: &str) -> String {
        format!("memory://{}", prefix)
    }
}
