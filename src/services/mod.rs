//! Services
//!
//! Scan orchestration and artifact publishing.

pub mod publisher;
pub mod runner;

pub use publisher::{ArtifactPublisher, RetentionPolicy};
pub use runner::{ScanOutcome, ScanRunner};
