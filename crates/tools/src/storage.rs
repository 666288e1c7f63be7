//! Directory-scoped storage backend used by `file-operation` steps.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

use crate::error::ToolError;

/// Storage backend rooted at a caller-chosen directory.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read a file as UTF-8 text.
    async fn read(&self, path: &str) -> Result<String, ToolError>;

    /// Write a file, creating missing parent directories. Returns bytes written.
    async fn write(&self, path: &str, content: &str) -> Result<usize, ToolError>;

    /// List entry names in a directory, sorted.
    async fn list(&self, path: &str) -> Result<Vec<String>, ToolError>;

    /// Check whether a path exists.
    async fn exists(&self, path: &str) -> Result<bool, ToolError>;
}

/// Local filesystem storage confined to a root directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Create a storage backend rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path under the root, rejecting escapes.
    ///
    /// The path must stay under the root both lexically and once symlinks
    /// are followed: the deepest existing ancestor is canonicalized and
    /// checked against the canonical root. Dangling symlinks are rejected.
    async fn resolve(&self, path: &str) -> Result<PathBuf, ToolError> {
        let escape = || ToolError::Storage(format!("Path '{}' escapes the storage root", path));

        let mut resolved = self.root.clone();
        for component in Path::new(path).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(escape());
                }
            }
        }

        // Nothing can exist under a root that does not exist yet.
        let Ok(root) = tokio::fs::canonicalize(&self.root).await else {
            return Ok(resolved);
        };

        let mut existing = resolved.as_path();
        loop {
            if tokio::fs::symlink_metadata(existing).await.is_ok() {
                let real = tokio::fs::canonicalize(existing).await.map_err(|_| escape())?;
                if !real.starts_with(&root) {
                    tracing::warn!(path = %path, target = %real.display(), "Rejected path outside storage root");
                    return Err(escape());
                }
                break;
            }
            match existing.parent() {
                Some(parent) => existing = parent,
                None => break,
            }
        }

        Ok(resolved)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn read(&self, path: &str) -> Result<String, ToolError> {
        let full = self.resolve(path).await?;
        tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| ToolError::Storage(format!("Failed to read '{}': {}", path, e)))
    }

    async fn write(&self, path: &str, content: &str) -> Result<usize, ToolError> {
        let full = self.resolve(path).await?;

        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&full, content)
            .await
            .map_err(|e| ToolError::Storage(format!("Failed to write '{}': {}", path, e)))?;

        tracing::debug!(path = %full.display(), bytes = content.len(), "File written");
        Ok(content.len())
    }

    async fn list(&self, path: &str) -> Result<Vec<String>, ToolError> {
        let full = self.resolve(path).await?;
        let mut dir = tokio::fs::read_dir(&full)
            .await
            .map_err(|e| ToolError::Storage(format!("Failed to list '{}': {}", path, e)))?;

        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names.sort();
        Ok(names)
    }

    async fn exists(&self, path: &str) -> Result<bool, ToolError> {
        let full = self.resolve(path).await?;
        Ok(tokio::fs::try_exists(&full).await.unwrap_or(false))
    }
}
