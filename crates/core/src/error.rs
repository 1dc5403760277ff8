//! Core Error Types
//!
//! Defines the foundational error types used across the Scan Cascade workspace.
//! These error types are dependency-free (only thiserror + std) to keep the core
//! crate lightweight.
//!
//! Only two kinds are expected to reach the top-level caller of a scan:
//! `ScopeResolution` and `Publish`. Tool execution failures and timeouts are
//! converted into per-tool result data inside the engine.

use thiserror::Error;

/// Core error type for the Scan Cascade workspace.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The scan scope could not be computed (e.g. shallow clone)
    #[error("Scope resolution error: {0}")]
    ScopeResolution(String),

    /// An external tool could not be executed or its report could not be read
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// An external tool exceeded its time budget
    #[error("Tool timed out: {0}")]
    ToolTimeout(String),

    /// The artifact store rejected or could not accept the bundle
    #[error("Publish error: {0}")]
    Publish(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Parse errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a scope resolution error
    pub fn scope(msg: impl Into<String>) -> Self {
        Self::ScopeResolution(msg.into())
    }

    /// Create a tool execution error
    pub fn tool_execution(msg: impl Into<String>) -> Self {
        Self::ToolExecution(msg.into())
    }

    /// Create a tool timeout error
    pub fn tool_timeout(msg: impl Into<String>) -> Self {
        Self::ToolTimeout(msg.into())
    }

    /// Create a publish error
    pub fn publish(msg: impl Into<String>) -> Self {
        Self::Publish(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Convert CoreError to a string
impl From<CoreError> for String {
    fn from(err: CoreError) -> String {
        err.to_string()
    }
}
