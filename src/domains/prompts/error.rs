//! Prompt-specific error types.

use thiserror::Error;

use crate::domains::schema::ValidationError;

/// Errors that can occur during prompt operations.
#[derive(Debug, Clone, Error)]
pub enum PromptError {
    /// The requested prompt was not found.
    #[error("Prompt not found: {0}")]
    NotFound(String),

    /// Invalid arguments were provided to the prompt.
    #[error("Invalid arguments: {0}")]
    Validation(#[from] ValidationError),

    /// A prompt with this name is already registered.
    #[error("Prompt already registered: {0}")]
    DuplicateName(String),

    /// The renderer could not produce text.
    #[error("Render error: {0}")]
    Render(String),
}

impl PromptError {
    /// Create a new "not found" error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    /// Create a new "duplicate name" error.
    pub fn duplicate(name: impl Into<String>) -> Self {
        Self::DuplicateName(name.into())
    }

    /// Create a new "render" error.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation",
            Self::DuplicateName(_) => "duplicate_name",
            Self::Render(_) => "render",
        }
    }
}
