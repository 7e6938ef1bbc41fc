//! Error Types

use thiserror::Error;

/// Result type alias for tool operations
pub type Result<T> = std::result::Result<T, ToolError>;

/// Tool dispatch error types
#[derive(Error, Debug)]
pub enum ToolError {
    /// Tool not found in registry
    #[error("Tool not found: {0}")]
    ToolNotFound(String),
    
    /// Arguments missing or malformed
    #[error("Tool validation error: {0}")]
    ToolValidation(String),
    
    /// Tool execution failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),
    
    /// A backing service failed transiently; the same call may succeed later
    #[error("Tool temporarily unavailable: {0}")]
    ToolUnavailable(String),
    
    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    
    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl ToolError {
    /// Check if error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ToolUnavailable(_))
    }
    
    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::ToolNotFound(name) => format!("The action '{name}' is not available."),
            Self::ToolValidation(msg) => format!("Invalid input: {msg}"),
            Self::ToolExecution(msg) => format!("Action failed: {msg}"),
            Self::ToolUnavailable(_) => "The action is temporarily unavailable, please try again.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for ToolError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
