//! Storage Layer
//!
//! Handles persistence: the TOML scan config and the filesystem artifact store.

pub mod config;
pub mod fs_store;

pub use config::*;
pub use fs_store::*;
