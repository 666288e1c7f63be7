//! Execution context for step handlers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Execution context passed to step handlers during execution.
///
/// Holds the variable tree of a single run:
/// - `input` seeded at run start
/// - one entry per bound step output
///
/// Handlers receive a shared reference; only the engine mutates it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Execution ID owning this context.
    pub execution_id: String,

    /// Workflow being executed.
    pub workflow: String,

    /// Variables available for template rendering and expressions.
    #[serde(default)]
    pub variables: Map<String, Value>,
}

impl ExecutionContext {
    /// Create a new execution context seeded with the run input.
    pub fn new(execution_id: impl Into<String>, workflow: impl Into<String>, input: Value) -> Self {
        let mut variables = Map::new();
        variables.insert("input".to_string(), input);
        Self {
            execution_id: execution_id.into(),
            workflow: workflow.into(),
            variables,
        }
    }

    /// Set a variable value, shadowing any previous binding.
    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    /// Get a top-level variable value.
    pub fn get_variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Look up a dotted path (`a.b.0.c`) in the variable tree.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.variables.get(first)?;
        for segment in segments {
            current = descend(current, segment)?;
        }
        Some(current)
    }

    /// Convert the variable tree to a single JSON object.
    pub fn to_value(&self) -> Value {
        Value::Object(self.variables.clone())
    }
}

/// Index one level into an object (by key) or array (by position).
pub fn descend<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(obj) => obj.get(segment),
        Value::Array(arr) => {
            let idx: usize = segment.parse().ok()?;
            arr.get(idx)
        }
        _ => None,
    }
}

/// Look up a dotted path starting from an arbitrary JSON value.
pub fn json_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = descend(current, segment)?;
    }
    Some(current)
}

/// String form used when a value is spliced into text.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => value.to_string(),
    }
}
