//! Step handler error types.

use thiserror::Error;

/// Errors that can occur while executing a single step.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ToolError {
    /// No handler registered for a delegated step type.
    #[error("Unknown step type: {0}")]
    UnknownStepType(String),

    /// A required host capability was not configured.
    #[error("Handler missing: {0}")]
    HandlerMissing(String),

    /// Handler execution failed.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Step parameters are malformed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Remote endpoint answered with a non-2xx status.
    #[error("HTTP {status} response: {body}")]
    HttpStatus { status: u16, body: String },

    /// Expression parse or evaluation error.
    #[error("Expression error: {0}")]
    Expression(String),

    /// Storage backend rejected the operation.
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl ToolError {
    /// Whether a retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ToolError::UnknownStepType(_)
                | ToolError::HandlerMissing(_)
                | ToolError::Configuration(_)
                | ToolError::Expression(_)
        )
    }
}

impl From<std::io::Error> for ToolError {
    fn from(e: std::io::Error) -> Self {
        ToolError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(e: serde_json::Error) -> Self {
        ToolError::Json(e.to_string())
    }
}

impl From<reqwest::Error> for ToolError {
    fn from(e: reqwest::Error) -> Self {
        ToolError::Http(e.to_string())
    }
}

impl From<crate::expr::ExprError> for ToolError {
    fn from(e: crate::expr::ExprError) -> Self {
        ToolError::Expression(e.to_string())
    }
}
