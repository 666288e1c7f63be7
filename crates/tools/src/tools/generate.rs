//! Content generation tool.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ToolError;

/// Generate step parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateParams {
    /// Prompt passed to the text generator (templated).
    pub prompt: String,

    /// Free-form hints forwarded to the generator (model, temperature, ...).
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub hints: Value,
}

/// Host-supplied text generation capability.
///
/// Implementations must be safe to call concurrently.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Produce text for a resolved prompt.
    async fn generate(&self, prompt: &str, hints: &Value) -> Result<String, ToolError>;
}

/// Content generation tool delegating to an optional [`TextGenerator`].
#[derive(Clone, Default)]
pub struct GenerateTool {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl GenerateTool {
    /// Create a generate tool.
    pub fn new(generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self { generator }
    }

    /// Whether a text generator is configured.
    pub fn is_configured(&self) -> bool {
        self.generator.is_some()
    }

    /// Run the generator with resolved parameters.
    pub async fn execute(&self, params: &GenerateParams) -> Result<Value, ToolError> {
        let generator = self.generator.as_ref().ok_or_else(|| {
            ToolError::HandlerMissing("no text generator configured for generate steps".to_string())
        })?;

        tracing::debug!(prompt_len = params.prompt.len(), "Generating content");

        let text = generator.generate(&params.prompt, &params.hints).await?;
        Ok(Value::String(text))
    }
}

impl std::fmt::Debug for GenerateTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerateTool")
            .field("configured", &self.is_configured())
            .finish()
    }
}

/// Text generator backed by an HTTP endpoint.
///
/// Posts `{"prompt": ..., "hints": ...}` and reads the `text` field of the JSON
/// reply, falling back to the raw body when the reply is not such an object.
#[derive(Debug, Clone)]
pub struct HttpTextGenerator {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpTextGenerator {
    /// Create a generator posting to `url`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: super::http::build_client(timeout),
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, prompt: &str, hints: &Value) -> Result<String, ToolError> {
        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&serde_json::json!({
                "prompt": prompt,
                "hints": hints,
            }))
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        if !(200..300).contains(&status) {
            return Err(ToolError::HttpStatus { status, body });
        }

        match serde_json::from_str::<Value>(&body) {
            Ok(Value::Object(obj)) => match obj.get("text") {
                Some(Value::String(text)) => Ok(text.clone()),
                _ => Ok(body),
            },
            _ => Ok(body),
        }
    }
}
