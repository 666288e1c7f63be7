//! HTTP remote-call tool.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ToolError;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
#[allow(clippy::upper_case_acronyms)] // HTTP methods are conventionally uppercase
pub enum HttpMethod {
    #[default]
    GET,
    POST,
    PUT,
    PATCH,
    DELETE,
    HEAD,
    OPTIONS,
}

impl FromStr for HttpMethod {
    type Err = ToolError;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::GET),
            "POST" => Ok(HttpMethod::POST),
            "PUT" => Ok(HttpMethod::PUT),
            "PATCH" => Ok(HttpMethod::PATCH),
            "DELETE" => Ok(HttpMethod::DELETE),
            "HEAD" => Ok(HttpMethod::HEAD),
            "OPTIONS" => Ok(HttpMethod::OPTIONS),
            _ => Err(ToolError::Configuration(format!("Unknown HTTP method: {}", s))),
        }
    }
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::GET => Method::GET,
            HttpMethod::POST => Method::POST,
            HttpMethod::PUT => Method::PUT,
            HttpMethod::PATCH => Method::PATCH,
            HttpMethod::DELETE => Method::DELETE,
            HttpMethod::HEAD => Method::HEAD,
            HttpMethod::OPTIONS => Method::OPTIONS,
        }
    }
}

fn default_method() -> String {
    "GET".to_string()
}

/// Remote-call step parameters.
///
/// `method` and `timeout_seconds` stay untyped until the step runs so they
/// can be supplied through placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCallParams {
    /// URL to request.
    pub url: String,

    /// HTTP method, any case (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Request headers.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    /// Query parameters.
    #[serde(default, alias = "params", skip_serializing_if = "HashMap::is_empty")]
    pub query: HashMap<String, String>,

    /// Request body. Strings are sent verbatim, anything else as JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    /// Request timeout in seconds, overriding the tool default. A number or
    /// a numeric string.
    #[serde(default, alias = "timeoutSeconds", skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<Value>,
}

impl RemoteCallParams {
    /// Parsed HTTP method.
    pub fn http_method(&self) -> Result<HttpMethod, ToolError> {
        self.method.parse()
    }

    /// Parsed per-request timeout, if one is set.
    pub fn timeout(&self) -> Result<Option<Duration>, ToolError> {
        let seconds = match &self.timeout_seconds {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
            Some(_) => None,
        };

        seconds.map(|s| Some(Duration::from_secs(s))).ok_or_else(|| {
            ToolError::Configuration(format!(
                "timeoutSeconds must be a non-negative integer, got {}",
                self.timeout_seconds.as_ref().map(|v| v.to_string()).unwrap_or_default()
            ))
        })
    }
}

/// Build a client with a default timeout.
///
/// A builder failure falls back to the default client; callers still apply
/// `timeout` per request.
pub(crate) fn build_client(timeout: Duration) -> reqwest::Client {
    match reqwest::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(
                error = %e,
                timeout_ms = timeout.as_millis() as u64,
                "Failed to build HTTP client, using defaults"
            );
            reqwest::Client::default()
        }
    }
}

/// Maximum number of body characters carried in a status error.
const ERROR_BODY_LIMIT: usize = 512;

/// HTTP request tool.
#[derive(Debug, Clone)]
pub struct HttpTool {
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl HttpTool {
    /// Create a new HTTP tool with the given default request timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            timeout: Some(timeout),
        }
    }

    /// Create an HTTP tool with a custom client; its own timeout applies.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: None,
        }
    }

    /// Execute an HTTP request; any non-2xx status is an error.
    ///
    /// The result is the response body parsed as JSON, or the raw text when the
    /// body is not JSON. An empty body yields `null`.
    pub async fn execute(&self, params: &RemoteCallParams) -> Result<Value, ToolError> {
        let start = std::time::Instant::now();

        let method = params.http_method()?;
        let timeout = params.timeout()?.or(self.timeout);
        let mut request = self.client.request(Method::from(method), &params.url);

        if !params.query.is_empty() {
            request = request.query(&params.query);
        }

        for (key, value) in &params.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        if let Some(ref body) = params.body {
            match body {
                Value::String(s) => {
                    request = request.body(s.clone());
                }
                _ => {
                    request = request.json(body);
                }
            }
        }

        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        tracing::debug!(
            url = %params.url,
            method = ?method,
            "Executing HTTP request"
        );

        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();

        tracing::debug!(
            url = %params.url,
            status,
            duration_ms = start.elapsed().as_millis() as u64,
            "HTTP request finished"
        );

        if !(200..300).contains(&status) {
            let body: String = text.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(ToolError::HttpStatus { status, body });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

impl Default for HttpTool {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}
