//! Data transform tool.
//!
//! A transform reads one context variable, binds it as `value` and either
//! evaluates a restricted expression over it or applies a named function.
//! The context is never mutated.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::context::{value_to_string, ExecutionContext};
use crate::error::ToolError;
use crate::expr::Expression;

/// Pure function applied by `transform` steps.
pub type TransformFn = Arc<dyn Fn(&Value) -> Result<Value, ToolError> + Send + Sync>;

/// Transform step parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformParams {
    /// Dotted path of the context variable to transform.
    pub variable: String,

    /// Restricted expression evaluated with the variable bound as `value`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,

    /// Name of a registered transform function.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
}

/// Transform tool holding the function table.
#[derive(Clone)]
pub struct TransformTool {
    functions: HashMap<String, TransformFn>,
}

impl TransformTool {
    /// Create a transform tool with the built-in functions registered.
    pub fn new() -> Self {
        let mut tool = Self {
            functions: HashMap::new(),
        };
        tool.register_builtins();
        tool
    }

    fn register_builtins(&mut self) {
        self.register("uppercase", |v| string_arg("uppercase", v).map(|s| Value::String(s.to_uppercase())));
        self.register("lowercase", |v| string_arg("lowercase", v).map(|s| Value::String(s.to_lowercase())));
        self.register("trim", |v| string_arg("trim", v).map(|s| Value::String(s.trim().to_string())));
        self.register("to-string", |v| Ok(Value::String(value_to_string(v))));
        self.register("length", |v| match v {
            Value::String(s) => Ok(Value::from(s.chars().count())),
            Value::Array(arr) => Ok(Value::from(arr.len())),
            Value::Object(obj) => Ok(Value::from(obj.len())),
            other => Err(type_error("length", "string, array or object", other)),
        });
        self.register("parse-json", |v| {
            let text = string_arg("parse-json", v)?;
            Ok(serde_json::from_str(text)?)
        });
        self.register("keys", |v| match v {
            Value::Object(obj) => Ok(Value::from(obj.keys().cloned().collect::<Vec<_>>())),
            other => Err(type_error("keys", "object", other)),
        });
        self.register("values", |v| match v {
            Value::Object(obj) => Ok(Value::Array(obj.values().cloned().collect())),
            other => Err(type_error("values", "object", other)),
        });
    }

    /// Register a transform function, replacing any previous one with the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&Value) -> Result<Value, ToolError> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
    }

    /// Check if a function is registered.
    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// List registered function names.
    pub fn functions(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Apply the transform to the current context.
    pub fn execute(&self, params: &TransformParams, ctx: &ExecutionContext) -> Result<Value, ToolError> {
        let value = ctx.lookup(&params.variable).ok_or_else(|| {
            ToolError::ExecutionFailed(format!(
                "Variable '{}' not found in context",
                params.variable
            ))
        })?;

        match (&params.expression, &params.function) {
            (Some(expression), None) => {
                let expr = Expression::parse(expression)?;
                let mut root = ctx.variables.clone();
                root.insert("value".to_string(), value.clone());
                Ok(expr.evaluate(&Value::Object(root))?)
            }
            (None, Some(name)) => {
                let function = self.functions.get(name).ok_or_else(|| {
                    ToolError::Configuration(format!("Unknown transform function: {}", name))
                })?;
                function(value)
            }
            (Some(_), Some(_)) => Err(ToolError::Configuration(
                "transform accepts either 'expression' or 'function', not both".to_string(),
            )),
            (None, None) => Err(ToolError::Configuration(
                "transform requires 'expression' or 'function'".to_string(),
            )),
        }
    }
}

impl Default for TransformTool {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TransformTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformTool")
            .field("functions", &self.functions())
            .finish()
    }
}

fn string_arg<'a>(function: &str, value: &'a Value) -> Result<&'a str, ToolError> {
    value
        .as_str()
        .ok_or_else(|| type_error(function, "string", value))
}

fn type_error(function: &str, expected: &str, got: &Value) -> ToolError {
    let kind = match got {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    ToolError::ExecutionFailed(format!("{} expects a {}, got {}", function, expected, kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> ExecutionContext {
        let mut ctx = ExecutionContext::new("e", "w", json!({"name": "Ada", "n": 4}));
        ctx.set_variable("profile", json!({"tags": ["a", "b"], "raw": "{\"k\": 1}"}));
        ctx
    }

    fn params(variable: &str, expression: Option<&str>, function: Option<&str>) -> TransformParams {
        TransformParams {
            variable: variable.to_string(),
            expression: expression.map(String::from),
            function: function.map(String::from),
        }
    }

    #[test]
    fn test_expression_binds_value() {
        let tool = TransformTool::new();
        let result = tool
            .execute(&params("input.name", Some("'Hello, ' + value"), None), &ctx())
            .unwrap();
        assert_eq!(result, json!("Hello, Ada"));
    }

    #[test]
    fn test_expression_sees_rest_of_context() {
        let tool = TransformTool::new();
        let result = tool
            .execute(&params("input.n", Some("value * 2 + input.n"), None), &ctx())
            .unwrap();
        assert_eq!(result, json!(12));
    }

    #[test]
    fn test_builtin_functions() {
        let tool = TransformTool::new();
        let ctx = ctx();
        assert_eq!(
            tool.execute(&params("input.name", None, Some("uppercase")), &ctx).unwrap(),
            json!("ADA")
        );
        assert_eq!(
            tool.execute(&params("profile.tags", None, Some("length")), &ctx).unwrap(),
            json!(2)
        );
        assert_eq!(
            tool.execute(&params("profile.raw", None, Some("parse-json")), &ctx).unwrap(),
            json!({"k": 1})
        );
        assert_eq!(
            tool.execute(&params("input", None, Some("keys")), &ctx).unwrap(),
            json!(["n", "name"])
        );
    }

    #[test]
    fn test_registered_function() {
        let mut tool = TransformTool::new();
        tool.register("double", |v| {
            let n = v.as_i64().ok_or_else(|| ToolError::ExecutionFailed("not a number".into()))?;
            Ok(json!(n * 2))
        });
        assert!(tool.has_function("double"));
        assert_eq!(
            tool.execute(&params("input.n", None, Some("double")), &ctx()).unwrap(),
            json!(8)
        );
    }

    #[test]
    fn test_missing_variable_fails() {
        let tool = TransformTool::new();
        let result = tool.execute(&params("input.missing", Some("value"), None), &ctx());
        assert!(matches!(result, Err(ToolError::ExecutionFailed(_))));
    }

    #[test]
    fn test_unknown_function_and_bad_params() {
        let tool = TransformTool::new();
        let ctx = ctx();
        assert!(matches!(
            tool.execute(&params("input.name", None, Some("reverse")), &ctx),
            Err(ToolError::Configuration(_))
        ));
        assert!(matches!(
            tool.execute(&params("input.name", None, None), &ctx),
            Err(ToolError::Configuration(_))
        ));
        assert!(matches!(
            tool.execute(&params("input.name", Some("value"), Some("trim")), &ctx),
            Err(ToolError::Configuration(_))
        ));
    }

    #[test]
    fn test_function_type_mismatch() {
        let tool = TransformTool::new();
        let result = tool.execute(&params("input.n", None, Some("uppercase")), &ctx());
        assert_eq!(
            result,
            Err(ToolError::ExecutionFailed("uppercase expects a string, got number".to_string()))
        );
    }
}
