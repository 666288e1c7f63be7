//! Workflow file parsing and validation.

use std::collections::HashSet;
use std::path::Path;

use serde_json::Value;
use stepflow_tools::{Expression, TemplateResolver};

use crate::error::{EngineError, EngineResult};
use crate::workflow::types::{StepAction, StepSpec, WorkflowDocument};

/// Parse a YAML workflow document and validate it.
pub fn parse_workflow_yaml(content: &str) -> EngineResult<WorkflowDocument> {
    let doc: WorkflowDocument =
        serde_yaml::from_str(content).map_err(|e| EngineError::InvalidWorkflow(e.to_string()))?;
    validate_workflow(&doc.name, &doc.steps)?;
    Ok(doc)
}

/// Parse a JSON workflow document and validate it.
pub fn parse_workflow_json(content: &str) -> EngineResult<WorkflowDocument> {
    let doc: WorkflowDocument =
        serde_json::from_str(content).map_err(|e| EngineError::InvalidWorkflow(e.to_string()))?;
    validate_workflow(&doc.name, &doc.steps)?;
    Ok(doc)
}

/// Parse a workflow file, picking the format from the extension.
///
/// `.json` files are read as JSON, everything else as YAML.
pub fn parse_workflow_file(path: &Path, content: &str) -> EngineResult<WorkflowDocument> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => parse_workflow_json(content),
        _ => parse_workflow_yaml(content),
    }
}

/// Validate a workflow before registration.
///
/// Checks for a non-empty name, at least one step, non-empty and unique
/// top-level step ids, and well-formed step parameters (recursively).
pub fn validate_workflow(name: &str, steps: &[StepSpec]) -> EngineResult<()> {
    if name.trim().is_empty() {
        return Err(EngineError::InvalidWorkflow(
            "Workflow name must not be empty".to_string(),
        ));
    }

    if steps.is_empty() {
        return Err(EngineError::InvalidWorkflow(format!(
            "Workflow '{}' must have at least one step",
            name
        )));
    }

    let mut seen = HashSet::new();
    for step in steps {
        if !seen.insert(step.id.as_str()) {
            return Err(EngineError::InvalidWorkflow(format!(
                "Workflow '{}': duplicate step id '{}'",
                name, step.id
            )));
        }
        validate_step(name, step)?;
    }

    Ok(())
}

fn validate_step(workflow: &str, step: &StepSpec) -> EngineResult<()> {
    let invalid = |msg: String| {
        EngineError::InvalidWorkflow(format!("Workflow '{}', step '{}': {}", workflow, step.id, msg))
    };

    if step.id.trim().is_empty() {
        return Err(EngineError::InvalidWorkflow(format!(
            "Workflow '{}': step id must not be empty",
            workflow
        )));
    }

    if let Some(ref var) = step.output_variable {
        if var.trim().is_empty() {
            return Err(invalid("outputVariable must not be empty".to_string()));
        }
    }

    match &step.action {
        StepAction::Transform(params) => {
            match (&params.expression, &params.function) {
                (Some(expr), None) => {
                    Expression::parse(expr)
                        .map_err(|e| invalid(format!("invalid expression: {}", e)))?;
                }
                (None, Some(_)) => {}
                _ => {
                    return Err(invalid(
                        "transform needs exactly one of 'expression' or 'function'".to_string(),
                    ))
                }
            }
            if params.variable.trim().is_empty() {
                return Err(invalid("transform 'variable' must not be empty".to_string()));
            }
        }
        StepAction::Condition {
            condition,
            true_branch,
            false_branch,
        } => {
            Expression::parse(condition)
                .map_err(|e| invalid(format!("invalid condition: {}", e)))?;
            for branch in [true_branch, false_branch].into_iter().flatten() {
                validate_step(workflow, branch)?;
            }
        }
        StepAction::Parallel { steps } => {
            if steps.is_empty() {
                return Err(invalid("parallel step needs at least one sub-step".to_string()));
            }
            for sub in steps {
                validate_step(workflow, sub)?;
            }
        }
        StepAction::RemoteCall(params) => {
            // Placeholders are checked once resolved at run time.
            if !TemplateResolver::is_template(&params.method) {
                params.http_method().map_err(|e| invalid(e.to_string()))?;
            }
            let templated_timeout = matches!(
                &params.timeout_seconds,
                Some(Value::String(s)) if TemplateResolver::is_template(s)
            );
            if !templated_timeout {
                params.timeout().map_err(|e| invalid(e.to_string()))?;
            }
        }
        StepAction::Generate(_) | StepAction::FileOperation(_) | StepAction::Delegate { .. } => {}
    }

    Ok(())
}
