//! Placeholder resolver for step parameters.

use regex::{Captures, Regex};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::LazyLock;

use crate::context::{value_to_string, ExecutionContext};
use crate::error::ToolError;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([^{}\s]+)\s*\}\}").expect("placeholder pattern is valid")
});

/// Resolves `{{dotted.path}}` placeholders against an execution context.
///
/// Unresolvable placeholders are left as-is; resolution itself never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateResolver;

impl TemplateResolver {
    /// Create a new resolver.
    pub fn new() -> Self {
        Self
    }

    /// Check if a string contains placeholder syntax.
    pub fn is_template(s: &str) -> bool {
        s.contains("{{")
    }

    /// Resolve every placeholder in a string.
    pub fn resolve_str(&self, template: &str, ctx: &ExecutionContext) -> String {
        if !Self::is_template(template) {
            return template.to_string();
        }

        PLACEHOLDER
            .replace_all(template, |caps: &Captures| match ctx.lookup(&caps[1]) {
                Some(value) => value_to_string(value),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Resolve every string leaf of a JSON value.
    pub fn resolve_value(&self, value: &Value, ctx: &ExecutionContext) -> Value {
        match value {
            Value::String(s) => Value::String(self.resolve_str(s, ctx)),
            Value::Object(obj) => Value::Object(
                obj.iter()
                    .map(|(k, v)| (k.clone(), self.resolve_value(v, ctx)))
                    .collect(),
            ),
            Value::Array(arr) => {
                Value::Array(arr.iter().map(|v| self.resolve_value(v, ctx)).collect())
            }
            _ => value.clone(),
        }
    }

    /// Resolve a typed parameter struct by round-tripping it through JSON.
    pub fn resolve_params<T>(&self, params: &T, ctx: &ExecutionContext) -> Result<T, ToolError>
    where
        T: Serialize + DeserializeOwned,
    {
        let raw = serde_json::to_value(params)?;
        let resolved = self.resolve_value(&raw, ctx);
        serde_json::from_value(resolved)
            .map_err(|e| ToolError::Configuration(format!("Invalid parameters after templating: {}", e)))
    }
}
