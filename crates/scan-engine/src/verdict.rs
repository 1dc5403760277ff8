//! Verdict Engine
//!
//! Applies the failure policy to an aggregated bundle. `decide` is a pure
//! function of the bundle and request; `fail_on_findings` does not influence
//! it and only governs what the caller does with the verdict.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::{AggregatedBundle, ScanRequest, ToolName, ToolOutcome, Verdict};

/// How a `SKIPPED` outcome affects the verdict
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkippedPolicy {
    /// A tool with nothing to scan never contributes
    #[default]
    Ignore,
    /// Treat a skipped tool as a failure under strict policies
    Contribute,
}

impl std::fmt::Display for SkippedPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkippedPolicy::Ignore => write!(f, "ignore"),
            SkippedPolicy::Contribute => write!(f, "contribute"),
        }
    }
}

impl std::str::FromStr for SkippedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(SkippedPolicy::Ignore),
            "contribute" => Ok(SkippedPolicy::Contribute),
            other => Err(format!("unknown skipped policy: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VerdictEngine {
    skipped_policy: SkippedPolicy,
}

impl VerdictEngine {
    pub fn new(skipped_policy: SkippedPolicy) -> Self {
        Self { skipped_policy }
    }

    fn contributes(&self, outcome: ToolOutcome) -> bool {
        outcome.contributes_to_verdict()
            || (outcome == ToolOutcome::Skipped && self.skipped_policy == SkippedPolicy::Contribute)
    }

    /// Decide the verdict for the tools the request scheduled.
    pub fn decide(&self, bundle: &AggregatedBundle, request: &ScanRequest) -> Verdict {
        let contributing_tools: BTreeSet<ToolName> = bundle
            .results
            .iter()
            .filter(|(tool, _)| request.tools.contains(tool))
            .filter(|(_, result)| self.contributes(result.outcome))
            .map(|(tool, _)| *tool)
            .collect();

        Verdict {
            has_findings: !contributing_tools.is_empty(),
            contributing_tools,
        }
    }
}
