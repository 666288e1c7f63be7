//! Error types for the Stepflow engine.

use stepflow_tools::ToolError;
use thiserror::Error;

/// Engine-level errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// No registered or catalog workflow with this name.
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    /// Workflow definition failed to parse or validate.
    #[error("Invalid workflow: {0}")]
    InvalidWorkflow(String),

    /// A step failed and the run was aborted.
    #[error("Step '{step_name}' ({step_id}) failed in execution {execution_id}: {source}")]
    StepExecution {
        execution_id: String,
        step_id: String,
        step_name: String,
        #[source]
        source: ToolError,
    },

    /// Built-in catalog could not be loaded.
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Underlying step error, when the run failed on a step.
    pub fn tool_error(&self) -> Option<&ToolError> {
        match self {
            EngineError::StepExecution { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<envy::Error> for EngineError {
    fn from(e: envy::Error) -> Self {
        EngineError::Config(e.to_string())
    }
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
