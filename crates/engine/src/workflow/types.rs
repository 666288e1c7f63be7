//! Workflow definition types.
//!
//! Steps are stored as a closed tagged union ([`StepAction`]) with one
//! variant per built-in type plus an explicit [`StepAction::Delegate`]
//! variant. On the wire a step is a flat object: common fields
//! (`id`, `name`, `type`, `outputVariable`, `retry`) sit next to the
//! type-specific parameters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use stepflow_tools::tools::{FileParams, GenerateParams, RemoteCallParams, TransformParams};
use stepflow_tools::RetryConfig;

/// Step type tags handled by the engine itself.
pub const GENERATE: &str = "generate";
pub const FILE_OPERATION: &str = "file-operation";
pub const REMOTE_CALL: &str = "remote-call";
pub const TRANSFORM: &str = "transform";
pub const CONDITION: &str = "condition";
pub const PARALLEL: &str = "parallel";

/// A single step of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawStep", into = "RawStep")]
pub struct StepSpec {
    /// Step identifier, unique among top-level steps.
    pub id: String,

    /// Display name (defaults to the id).
    pub name: String,

    /// What the step does.
    pub action: StepAction,

    /// Context variable the step result is bound to.
    pub output_variable: Option<String>,

    /// Retry policy for failing dispatches.
    pub retry: Option<RetryConfig>,
}

impl StepSpec {
    /// Create a step with no output binding and no retry policy.
    pub fn new(id: impl Into<String>, action: StepAction) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            action,
            output_variable: None,
            retry: None,
        }
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Bind the step result under `variable`.
    pub fn with_output(mut self, variable: impl Into<String>) -> Self {
        self.output_variable = Some(variable.into());
        self
    }

    /// Attach a retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Type tag as written in workflow files.
    pub fn step_type(&self) -> &str {
        self.action.step_type()
    }
}

/// Type-specific behaviour of a step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepAction {
    /// Text generation through the host generator.
    Generate(GenerateParams),

    /// Read/write/list/exists under the storage root.
    FileOperation(FileParams),

    /// HTTP request.
    RemoteCall(RemoteCallParams),

    /// Expression or named function over one context variable.
    Transform(TransformParams),

    /// Branch on a restricted expression.
    Condition {
        condition: String,
        true_branch: Option<Box<StepSpec>>,
        false_branch: Option<Box<StepSpec>>,
    },

    /// Concurrent fan-out over one context snapshot.
    Parallel { steps: Vec<StepSpec> },

    /// Forwarded to a caller-registered handler.
    Delegate { step_type: String, params: Value },
}

impl StepAction {
    /// Type tag as written in workflow files.
    pub fn step_type(&self) -> &str {
        match self {
            StepAction::Generate(_) => GENERATE,
            StepAction::FileOperation(_) => FILE_OPERATION,
            StepAction::RemoteCall(_) => REMOTE_CALL,
            StepAction::Transform(_) => TRANSFORM,
            StepAction::Condition { .. } => CONDITION,
            StepAction::Parallel { .. } => PARALLEL,
            StepAction::Delegate { step_type, .. } => step_type,
        }
    }
}

/// Flat wire form of a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawStep {
    #[serde(default)]
    id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,

    #[serde(rename = "type")]
    step_type: String,

    #[serde(
        default,
        rename = "outputVariable",
        alias = "output_variable",
        skip_serializing_if = "Option::is_none"
    )]
    output_variable: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    retry: Option<RetryConfig>,

    #[serde(flatten)]
    params: Map<String, Value>,
}

#[derive(Serialize, Deserialize)]
struct ConditionParams {
    condition: String,

    #[serde(
        default,
        rename = "trueBranch",
        alias = "true_branch",
        skip_serializing_if = "Option::is_none"
    )]
    true_branch: Option<Box<StepSpec>>,

    #[serde(
        default,
        rename = "falseBranch",
        alias = "false_branch",
        skip_serializing_if = "Option::is_none"
    )]
    false_branch: Option<Box<StepSpec>>,
}

#[derive(Serialize, Deserialize)]
struct ParallelParams {
    steps: Vec<StepSpec>,
}

fn parse_params<T: serde::de::DeserializeOwned>(
    id: &str,
    step_type: &str,
    params: Map<String, Value>,
) -> Result<T, String> {
    serde_json::from_value(Value::Object(params))
        .map_err(|e| format!("step '{}' ({}): {}", id, step_type, e))
}

impl TryFrom<RawStep> for StepSpec {
    type Error = String;

    fn try_from(raw: RawStep) -> Result<Self, Self::Error> {
        let RawStep {
            id,
            name,
            step_type,
            output_variable,
            retry,
            params,
        } = raw;

        let action = match step_type.as_str() {
            "" => return Err(format!("step '{}' has an empty type", id)),
            GENERATE => StepAction::Generate(parse_params(&id, &step_type, params)?),
            FILE_OPERATION => StepAction::FileOperation(parse_params(&id, &step_type, params)?),
            REMOTE_CALL => StepAction::RemoteCall(parse_params(&id, &step_type, params)?),
            TRANSFORM => StepAction::Transform(parse_params(&id, &step_type, params)?),
            CONDITION => {
                let p: ConditionParams = parse_params(&id, &step_type, params)?;
                StepAction::Condition {
                    condition: p.condition,
                    true_branch: p.true_branch,
                    false_branch: p.false_branch,
                }
            }
            PARALLEL => {
                let p: ParallelParams = parse_params(&id, &step_type, params)?;
                StepAction::Parallel { steps: p.steps }
            }
            _ => StepAction::Delegate {
                step_type: step_type.clone(),
                params: Value::Object(params),
            },
        };

        Ok(StepSpec {
            name: name.unwrap_or_else(|| id.clone()),
            id,
            action,
            output_variable,
            retry,
        })
    }
}

fn to_params<T: Serialize>(value: &T) -> Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

impl From<StepSpec> for RawStep {
    fn from(step: StepSpec) -> Self {
        let step_type = step.step_type().to_string();
        let params = match step.action {
            StepAction::Generate(p) => to_params(&p),
            StepAction::FileOperation(p) => to_params(&p),
            StepAction::RemoteCall(p) => to_params(&p),
            StepAction::Transform(p) => to_params(&p),
            StepAction::Condition {
                condition,
                true_branch,
                false_branch,
            } => to_params(&ConditionParams {
                condition,
                true_branch,
                false_branch,
            }),
            StepAction::Parallel { steps } => to_params(&ParallelParams { steps }),
            StepAction::Delegate { params, .. } => match params {
                Value::Object(map) => map,
                Value::Null => Map::new(),
                other => {
                    let mut map = Map::new();
                    map.insert("params".to_string(), other);
                    map
                }
            },
        };

        let name = (step.name != step.id).then_some(step.name);

        RawStep {
            id: step.id,
            name,
            step_type,
            output_variable: step.output_variable,
            retry: step.retry,
            params,
        }
    }
}

/// Workflow as written in YAML/JSON files and the built-in catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDocument {
    /// Unique workflow name.
    pub name: String,

    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Ordered steps.
    pub steps: Vec<StepSpec>,
}

/// Where a resolvable workflow comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowSource {
    /// Shipped with the engine.
    Catalog,
    /// Registered by the caller at runtime.
    Registered,
}

impl std::fmt::Display for WorkflowSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Catalog => write!(f, "catalog"),
            Self::Registered => write!(f, "registered"),
        }
    }
}

/// A workflow known to the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    /// Registration id (`wf-` prefixed).
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub steps: Vec<StepSpec>,
    pub source: WorkflowSource,
    pub created_at: DateTime<Utc>,
    /// Number of runs that resolved this definition.
    pub execution_count: u64,
}

/// Listing entry for a workflow.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub source: WorkflowSource,
    pub step_count: usize,
    pub execution_count: u64,
}

impl From<&WorkflowDefinition> for WorkflowSummary {
    fn from(def: &WorkflowDefinition) -> Self {
        Self {
            name: def.name.clone(),
            description: def.description.clone(),
            source: def.source,
            step_count: def.steps.len(),
            execution_count: def.execution_count,
        }
    }
}
