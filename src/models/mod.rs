//! Data Models
//!
//! Application-level data structures. Scan data types live in the engine
//! crate and are re-exported from the crate root.

pub mod config;
pub mod manifest;

pub use config::{ScanConfig, ScopeFallback};
pub use manifest::{ArtifactHandle, ManifestEntry, RunManifest};
