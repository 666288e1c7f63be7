//! Built-in workflow catalog.
//!
//! Catalog workflows are plain YAML embedded at compile time and parsed
//! through the same path as caller-supplied files.

use crate::error::{EngineError, EngineResult};
use crate::workflow::{parse_workflow_yaml, WorkflowDocument};

const CATALOG: &[(&str, &str)] = &[
    (
        "code-generation.yaml",
        include_str!("../catalog/code-generation.yaml"),
    ),
    (
        "deployment-pipeline.yaml",
        include_str!("../catalog/deployment-pipeline.yaml"),
    ),
    (
        "content-review.yaml",
        include_str!("../catalog/content-review.yaml"),
    ),
];

/// Parse every built-in workflow.
pub fn builtin_workflows() -> EngineResult<Vec<WorkflowDocument>> {
    CATALOG
        .iter()
        .map(|(file, content)| {
            parse_workflow_yaml(content)
                .map_err(|e| EngineError::Catalog(format!("{}: {}", file, e)))
        })
        .collect()
}
