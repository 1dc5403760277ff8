//! Integration Tests Module
//!
//! End-to-end tests for Scan Cascade. Real scanners are replaced by scripted
//! adapters registered through the public registry, so the scheduler,
//! aggregator, verdict engine and publisher all run for real.

// Shared scripted adapters and fixtures
mod common;

// Scan runner end-to-end tests
mod scan_runner_test;

// Filesystem artifact store and retention tests
mod artifact_store_test;
