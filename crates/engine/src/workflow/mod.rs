//! Workflow model: step specs, documents and validation.

pub mod parser;
pub mod types;

pub use parser::{parse_workflow_file, parse_workflow_json, parse_workflow_yaml, validate_workflow};
pub use types::{
    StepAction, StepSpec, WorkflowDefinition, WorkflowDocument, WorkflowSource, WorkflowSummary,
};
