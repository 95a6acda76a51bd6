//! Tool-specific error types.

use std::time::Duration;
use thiserror::Error;

use crate::domains::schema::ValidationError;

/// Errors that can occur during tool registration and invocation.
///
/// All variants except [`ToolError::DuplicateName`] are recovered at the
/// dispatcher boundary and delivered to the client as the invocation result.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    /// The requested tool was not found.
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// Invalid arguments were provided to the tool.
    #[error("Invalid arguments: {0}")]
    Validation(#[from] ValidationError),

    /// The tool execution failed.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// The tool did not finish before the invocation deadline.
    #[error("Tool execution timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// A tool with this name is already registered.
    #[error("Tool already registered: {0}")]
    DuplicateName(String),
}

impl ToolError {
    /// Create a new "not found" error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    /// Create a new "execution failed" error.
    pub fn execution_failed(msg: impl Into<String>) -> Self {
        Self::ExecutionFailed(msg.into())
    }

    /// Create a new "duplicate name" error.
    pub fn duplicate(name: impl Into<String>) -> Self {
        Self::DuplicateName(name.into())
    }

    /// Stable machine-readable kind, used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation",
            Self::ExecutionFailed(_) => "execution",
            Self::Timeout(_) => "timeout",
            Self::DuplicateName(_) => "duplicate_name",
        }
    }

    /// Whether the request itself was at fault (as opposed to the tool run).
    pub fn is_request_error(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Validation(_))
    }
}
