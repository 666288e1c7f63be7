//! Engine configuration.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::EngineResult;

/// Engine configuration loaded from environment variables.
///
/// Environment variables are prefixed with `STEPFLOW_`:
/// - `STEPFLOW_STORAGE_ROOT`: Root directory for file operations (default: "./stepflow-data")
/// - `STEPFLOW_EXECUTION_RETENTION`: Maximum execution records kept in memory (default: 1000)
/// - `STEPFLOW_HTTP_TIMEOUT_SECONDS`: Default remote-call timeout (default: 30)
/// - `STEPFLOW_EVENT_BUFFER`: Capacity of the event broadcast channel (default: 256)
/// - `STEPFLOW_GENERATOR_URL`: HTTP endpoint for generate steps (optional)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EngineConfig {
    /// Root directory for file-operation steps
    #[serde(default = "default_storage_root")]
    pub storage_root: PathBuf,

    /// Maximum number of execution records retained
    #[serde(default = "default_execution_retention")]
    pub execution_retention: usize,

    /// Default remote-call timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub http_timeout_seconds: u64,

    /// Event broadcast channel capacity
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Text generation endpoint (optional)
    #[serde(default)]
    pub generator_url: Option<String>,
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./stepflow-data")
}

fn default_execution_retention() -> usize {
    1000
}

fn default_http_timeout() -> u64 {
    30
}

fn default_event_buffer() -> usize {
    256
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables are prefixed with `STEPFLOW_`.
    pub fn from_env() -> EngineResult<Self> {
        Ok(envy::prefixed("STEPFLOW_").from_env::<EngineConfig>()?)
    }

    /// Load configuration from an explicit set of variables.
    pub fn from_vars<I>(vars: I) -> EngineResult<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Ok(envy::prefixed("STEPFLOW_").from_iter::<_, EngineConfig>(vars)?)
    }

    /// Default remote-call timeout.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage_root: default_storage_root(),
            execution_retention: default_execution_retention(),
            http_timeout_seconds: default_http_timeout(),
            event_buffer: default_event_buffer(),
            generator_url: None,
        }
    }
}
