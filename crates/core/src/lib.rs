//! Scan Cascade Core
//!
//! Foundational error types and storage traits for the Scan Cascade
//! workspace. This crate has zero dependencies on the scan engine or the
//! application crate.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `store` - Key-value artifact store trait (`ArtifactStore`) and an in-memory implementation

pub mod error;
pub mod store;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Artifact Store ─────────────────────────────────────────────────────
pub use store::{validate_key, ArtifactStore, InMemoryArtifactStore};
