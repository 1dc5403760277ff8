//! Scan Cascade Engine
//!
//! Orchestration and aggregation core for running several security scanners
//! against one repository and reducing their results to a single verdict:
//!
//! - `models` - Scan data types (ToolName, ToolResult, AggregatedBundle, Verdict, etc.)
//! - `scope` - Whole-tree or changed-file scope resolution via git
//! - `adapters` - Per-tool adapters behind the `ToolAdapter` trait, plus the registry
//! - `scheduler` - Concurrent fan-out with per-tool timeouts and a global budget
//! - `aggregator` - Namespaced merge of report files into a combined directory
//! - `verdict` - Failure policy over the aggregated outcomes
//!
//! Configuration, artifact publishing and the CLI live in the main crate.

pub mod adapters;
pub mod aggregator;
pub mod models;
pub mod scheduler;
pub mod scope;
pub mod verdict;

// Re-export model types
pub use models::{
    parse_tool_list, AggregatedBundle, OutcomeRow, ScanRequest, ScanSummary, Scope, ScopeMode,
    SeverityLevel, ToolName, ToolOutcome, ToolResult, Verdict,
};

// Re-export adapter types
pub use adapters::{
    AdapterContext, AdapterFactory, AdapterRegistry, ToolAdapter, ToolInvocation, ToolSettings,
};

pub use aggregator::ResultAggregator;
pub use scheduler::{Scheduler, SchedulerConfig};
pub use scope::{ScopeResolver, DEFAULT_BASE_REF};
pub use verdict::{SkippedPolicy, VerdictEngine};
