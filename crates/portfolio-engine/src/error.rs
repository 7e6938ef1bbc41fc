//! Error Types for the Portfolio Engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed holding, trade, profile or request; never retried
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    
    /// History missing or too short; callers turn this into a skip entry
    #[error("Data unavailable for {symbol}: {reason}")]
    DataUnavailable {
        symbol: String,
        reason: String,
    },
    
    #[error("Pending execution not found: {0}")]
    PendingNotFound(String),
    
    #[error("Storage error: {0}")]
    Storage(String),
    
    #[error("Configuration error: {0}")]
    Config(String),
    
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
    
    pub fn unavailable(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }
    
    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
    
    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidInput(msg) => format!("The request was not valid: {msg}"),
            Self::DataUnavailable { symbol, .. } => format!("Market data for {symbol} is not available right now."),
            Self::PendingNotFound(id) => format!("No pending trades found for '{id}'."),
            Self::Config(_) => "Service configuration error.".into(),
            _ => "An error occurred processing your request.".into(),
        }
    }
}

impl From<EngineError> for tool_core::ToolError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidInput(msg) => Self::ToolValidation(msg),
            other if other.is_retryable() => Self::ToolUnavailable(other.to_string()),
            other => Self::ToolExecution(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tool_core::ToolError;

    #[test]
    fn test_retryability_survives_tool_boundary() {
        let storage: ToolError = EngineError::Storage("lock poisoned".into()).into();
        assert!(matches!(storage, ToolError::ToolUnavailable(_)));
        assert!(storage.is_retryable());

        for err in [
            EngineError::PendingNotFound("p-1".into()),
            EngineError::Config("bad ttl".into()),
            EngineError::unavailable("XYZ", "timeout"),
        ] {
            assert!(!err.is_retryable());
            let tool_err: ToolError = err.into();
            assert!(matches!(tool_err, ToolError::ToolExecution(_)));
            assert!(!tool_err.is_retryable());
        }

        let invalid: ToolError = EngineError::invalid("negative value").into();
        assert!(matches!(invalid, ToolError::ToolValidation(_)));
    }
}
