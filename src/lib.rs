//! Scan Cascade - Security Scan Orchestration
//!
//! Runs several independent security scanners against one repository,
//! tolerates any of them failing, and reduces their results to one verdict
//! plus a published artifact bundle. It includes:
//! - Scan configuration (TOML) and its loader
//! - The end-to-end scan runner and artifact publisher
//! - A filesystem artifact store with retention purging
//!
//! The scheduling, adapter and verdict logic lives in `scan-cascade-engine`.

pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

pub use models::{ArtifactHandle, ManifestEntry, RunManifest, ScanConfig, ScopeFallback};
pub use services::{ArtifactPublisher, RetentionPolicy, ScanOutcome, ScanRunner};
pub use storage::{ConfigService, FsArtifactStore};
pub use utils::error::{AppError, AppResult};
