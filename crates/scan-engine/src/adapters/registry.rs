//! Adapter Registry
//!
//! Static `ToolName -> AdapterFactory` mapping. Adding a tool means
//! registering a factory; the scheduler and aggregator never match on tool
//! names.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{BanditAdapter, ClamavAdapter, SemgrepAdapter, ToolAdapter, TrivyAdapter};
use crate::models::ToolName;

/// Per-tool settings from configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSettings {
    /// Executable name or path (defaults to the tool's usual binary)
    #[serde(default)]
    pub executable: Option<String>,
    /// Extra arguments inserted before the scan targets
    #[serde(default)]
    pub extra_args: Vec<String>,
    /// Per-tool timeout override in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ToolSettings {
    /// Configured executable, or `default` when none is set
    pub fn program_or(&self, default: &str) -> String {
        self.executable
            .clone()
            .filter(|exe| !exe.trim().is_empty())
            .unwrap_or_else(|| default.to_string())
    }

    /// Per-tool timeout, or `default` when none is set
    pub fn timeout_or(&self, default: Duration) -> Duration {
        self.timeout_secs.map(Duration::from_secs).unwrap_or(default)
    }
}

/// Factory building an adapter from its settings.
pub type AdapterFactory = Box<dyn Fn(&ToolSettings) -> Arc<dyn ToolAdapter> + Send + Sync>;

/// Registry of adapter factories keyed by tool.
pub struct AdapterRegistry {
    factories: BTreeMap<ToolName, AdapterFactory>,
}

impl AdapterRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Create a registry with the built-in adapters
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            ToolName::Bandit,
            Box::new(|s: &ToolSettings| {
                Arc::new(BanditAdapter::new(s.clone())) as Arc<dyn ToolAdapter>
            }),
        );
        registry.register(
            ToolName::Semgrep,
            Box::new(|s: &ToolSettings| {
                Arc::new(SemgrepAdapter::new(s.clone())) as Arc<dyn ToolAdapter>
            }),
        );
        registry.register(
            ToolName::Trivy,
            Box::new(|s: &ToolSettings| {
                Arc::new(TrivyAdapter::new(s.clone())) as Arc<dyn ToolAdapter>
            }),
        );
        registry.register(
            ToolName::Clamav,
            Box::new(|s: &ToolSettings| {
                Arc::new(ClamavAdapter::new(s.clone())) as Arc<dyn ToolAdapter>
            }),
        );
        registry
    }

    /// Register (or replace) the factory for `tool`
    pub fn register(&mut self, tool: ToolName, factory: AdapterFactory) {
        self.factories.insert(tool, factory);
    }

    /// Build the adapter for `tool`
    pub fn build(&self, tool: ToolName, settings: &ToolSettings) -> Option<Arc<dyn ToolAdapter>> {
        self.factories.get(&tool).map(|factory| factory(settings))
    }

    /// Whether a factory is registered for `tool`
    pub fn contains(&self, tool: ToolName) -> bool {
        self.factories.contains_key(&tool)
    }

    /// Registered tools in order
    pub fn tools(&self) -> Vec<ToolName> {
        self.factories.keys().copied().collect()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("tools", &self.tools())
            .finish()
    }
}
