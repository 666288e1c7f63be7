//! Delegate handler registry and retry policy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::context::ExecutionContext;
use crate::error::ToolError;

/// Retry configuration for step execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial delay between retries in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Maximum delay between retries in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Exponential backoff multiplier.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl RetryConfig {
    /// Delay to wait before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        let delay = self.initial_delay_ms as f64 * self.backoff_multiplier.max(1.0).powi(exponent);
        Duration::from_millis(delay.min(self.max_delay_ms as f64) as u64)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// Handler for step types outside the built-in set.
///
/// Implementations must be safe to call concurrently: parallel steps and
/// independent runs may invoke the same handler at the same time.
#[async_trait]
pub trait StepHandler: Send + Sync {
    /// Execute a delegated step with its resolved parameters.
    async fn handle(
        &self,
        step_type: &str,
        params: &Value,
        ctx: &ExecutionContext,
    ) -> Result<Value, ToolError>;
}

/// Registry of delegate handlers keyed by step type tag.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn StepHandler>>,
}

impl HandlerRegistry {
    /// Create a new empty handler registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a step type, replacing any previous one.
    pub fn register<H: StepHandler + 'static>(&mut self, step_type: impl Into<String>, handler: H) {
        self.handlers.insert(step_type.into(), Arc::new(handler));
    }

    /// Register an already shared handler.
    pub fn register_arc(&mut self, step_type: impl Into<String>, handler: Arc<dyn StepHandler>) {
        self.handlers.insert(step_type.into(), handler);
    }

    /// Get a handler by step type.
    pub fn get(&self, step_type: &str) -> Option<Arc<dyn StepHandler>> {
        self.handlers.get(step_type).cloned()
    }

    /// Check if a handler is registered.
    pub fn has(&self, step_type: &str) -> bool {
        self.handlers.contains_key(step_type)
    }

    /// List all registered step types.
    pub fn list(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(|s| s.as_str()).collect();
        types.sort_unstable();
        types
    }

    /// Forward a step to its registered handler.
    pub async fn execute(
        &self,
        step_type: &str,
        params: &Value,
        ctx: &ExecutionContext,
    ) -> Result<Value, ToolError> {
        let handler = self
            .get(step_type)
            .ok_or_else(|| ToolError::UnknownStepType(step_type.to_string()))?;
        handler.handle(step_type, params, ctx).await
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.list())
            .finish()
    }
}
