//! Run input assembly from CLI flags.

use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Build the run input from an input file, a JSON payload and `--set` flags.
///
/// Later sources override earlier ones key by key: file, then payload,
/// then `--set`. `--set` values are parsed as JSON when possible and kept
/// as strings otherwise.
pub fn build_input(
    input_file: Option<&Path>,
    payload: Option<&str>,
    variables: &[String],
) -> Result<Value> {
    let mut input = Map::new();

    if let Some(path) = input_file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file: {}", path.display()))?;
        let value: Value = serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in input file: {}", path.display()))?;
        merge_object(&mut input, value, "Input file")?;
    }

    if let Some(payload) = payload {
        let value: Value = serde_json::from_str(payload).context("Invalid JSON payload")?;
        merge_object(&mut input, value, "Payload")?;
    }

    for var in variables {
        let (key, raw) = var
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid variable format: {}. Expected key=value", var))?;
        if key.is_empty() {
            return Err(anyhow!("Invalid variable format: {}. Key must not be empty", var));
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        input.insert(key.to_string(), value);
    }

    Ok(Value::Object(input))
}

fn merge_object(into: &mut Map<String, Value>, value: Value, source: &str) -> Result<()> {
    match value {
        Value::Object(map) => {
            into.extend(map);
            Ok(())
        }
        _ => Err(anyhow!("{} must be a JSON object", source)),
    }
}

/// Whether a workflow reference names a file rather than a registered workflow.
pub fn is_file_reference(reference: &str) -> bool {
    let lower = reference.to_ascii_lowercase();
    reference.contains('/')
        || reference.contains('\\')
        || lower.ends_with(".yaml")
        || lower.ends_with(".yml")
        || lower.ends_with(".json")
        || PathBuf::from(reference).is_file()
}
