//! File operation tool.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::error::ToolError;
use crate::storage::Storage;

/// Supported file operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOperation {
    Read,
    Write,
    List,
    Exists,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Read => write!(f, "read"),
            FileOperation::Write => write!(f, "write"),
            FileOperation::List => write!(f, "list"),
            FileOperation::Exists => write!(f, "exists"),
        }
    }
}

/// File operation step parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileParams {
    /// Operation to perform.
    pub operation: FileOperation,

    /// Path relative to the storage root.
    pub path: String,

    /// Content to write (write only). Strings are written verbatim,
    /// anything else as pretty-printed JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
}

/// File operation tool over a [`Storage`] backend.
#[derive(Clone)]
pub struct FileTool {
    storage: Arc<dyn Storage>,
}

impl FileTool {
    /// Create a file tool over the given storage.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Execute a file operation.
    pub async fn execute(&self, params: &FileParams) -> Result<Value, ToolError> {
        tracing::debug!(operation = %params.operation, path = %params.path, "Executing file operation");

        match params.operation {
            FileOperation::Read => {
                let content = self.storage.read(&params.path).await?;
                Ok(Value::String(content))
            }
            FileOperation::Write => {
                let content = match &params.content {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => serde_json::to_string_pretty(other)?,
                    None => {
                        return Err(ToolError::Configuration(
                            "write operation requires 'content'".to_string(),
                        ))
                    }
                };
                let bytes = self.storage.write(&params.path, &content).await?;
                Ok(serde_json::json!({
                    "path": params.path,
                    "bytes": bytes,
                }))
            }
            FileOperation::List => {
                let entries = self.storage.list(&params.path).await?;
                Ok(Value::from(entries))
            }
            FileOperation::Exists => {
                let exists = self.storage.exists(&params.path).await?;
                Ok(Value::Bool(exists))
            }
        }
    }
}

impl std::fmt::Debug for FileTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileTool").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use serde_json::json;
    use tempfile::TempDir;

    fn tool(temp: &TempDir) -> FileTool {
        FileTool::new(Arc::new(LocalStorage::new(temp.path())))
    }

    fn params(value: Value) -> FileParams {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let temp = TempDir::new().unwrap();
        let tool = tool(&temp);

        let result = tool
            .execute(&params(json!({
                "operation": "write",
                "path": "out/notes.txt",
                "content": "hello"
            })))
            .await
            .unwrap();
        assert_eq!(result, json!({"path": "out/notes.txt", "bytes": 5}));

        let content = tool
            .execute(&params(json!({"operation": "read", "path": "out/notes.txt"})))
            .await
            .unwrap();
        assert_eq!(content, json!("hello"));
    }

    #[tokio::test]
    async fn test_write_structured_content_as_json() {
        let temp = TempDir::new().unwrap();
        let tool = tool(&temp);

        tool.execute(&params(json!({
            "operation": "write",
            "path": "data.json",
            "content": {"a": 1}
        })))
        .await
        .unwrap();

        let written = std::fs::read_to_string(temp.path().join("data.json")).unwrap();
        let parsed: Value = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, json!({"a": 1}));
    }

    #[tokio::test]
    async fn test_write_without_content_fails() {
        let temp = TempDir::new().unwrap();
        let tool = tool(&temp);
        let result = tool
            .execute(&params(json!({"operation": "write", "path": "x.txt"})))
            .await;
        assert!(matches!(result, Err(ToolError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_list_and_exists() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("one.txt"), "1").unwrap();
        let tool = tool(&temp);

        let listed = tool
            .execute(&params(json!({"operation": "list", "path": "."})))
            .await
            .unwrap();
        assert_eq!(listed, json!(["one.txt"]));

        let exists = tool
            .execute(&params(json!({"operation": "exists", "path": "one.txt"})))
            .await
            .unwrap();
        assert_eq!(exists, json!(true));
    }

    #[test]
    fn test_unknown_operation_rejected() {
        let result: Result<FileParams, _> =
            serde_json::from_value(json!({"operation": "delete", "path": "x"}));
        assert!(result.is_err());
    }
}
