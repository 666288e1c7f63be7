//! Execution state: records, step outcomes and run summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::workflow::StepSpec;

/// High-level execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Execution is in progress.
    Running,
    /// All steps ran; failures, if any, were tolerated.
    Completed,
    /// A step failure aborted the run.
    Failed,
}

impl ExecutionStatus {
    /// Whether the status is final.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Result status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Failed,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of one attempted top-level step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    pub step: StepSpec,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub completed_at: DateTime<Utc>,
    /// Dispatch attempts, including retries.
    pub attempts: u32,
    pub duration_ms: u64,
}

impl StepOutcome {
    /// A successful outcome.
    pub fn completed(step: StepSpec, result: Value, attempts: u32, duration_ms: u64) -> Self {
        Self {
            step,
            status: StepStatus::Completed,
            result: Some(result),
            error: None,
            completed_at: Utc::now(),
            attempts,
            duration_ms,
        }
    }

    /// A failed outcome.
    pub fn failed(step: StepSpec, error: String, attempts: u32, duration_ms: u64) -> Self {
        Self {
            step,
            status: StepStatus::Failed,
            result: None,
            error: Some(error),
            completed_at: Utc::now(),
            attempts,
            duration_ms,
        }
    }
}

/// Log line severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// One entry of an execution log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// Per-run options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOptions {
    /// Keep going after a failed step instead of aborting the run.
    #[serde(default, alias = "continue_on_error")]
    pub continue_on_error: bool,
}

impl RunOptions {
    /// Options with `continueOnError` set.
    pub fn continue_on_error() -> Self {
        Self {
            continue_on_error: true,
        }
    }
}

/// Full record of one workflow run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub id: String,
    pub workflow: String,
    pub input: Value,
    pub options: RunOptions,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub outcomes: Vec<StepOutcome>,
    /// Variable tree: `input` plus bound step outputs.
    pub context: Map<String, Value>,
    /// Context restricted to declared output variables (set on completion).
    pub results: Map<String, Value>,
    pub logs: Vec<LogEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionRecord {
    /// Create a running record seeded with `{input}`.
    pub fn new(id: String, workflow: String, input: Value, options: RunOptions) -> Self {
        let mut context = Map::new();
        context.insert("input".to_string(), input.clone());
        Self {
            id,
            workflow,
            input,
            options,
            status: ExecutionStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            outcomes: Vec::new(),
            context,
            results: Map::new(),
            logs: Vec::new(),
            error: None,
        }
    }

    /// Append a log line.
    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        self.logs.push(LogEntry {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        });
    }

    /// Mark the run completed.
    pub fn complete(&mut self, results: Map<String, Value>, duration_ms: u64) {
        self.finish(ExecutionStatus::Completed, duration_ms);
        self.results = results;
    }

    /// Mark the run failed with the triggering error.
    pub fn fail(&mut self, error: String, duration_ms: u64) {
        self.finish(ExecutionStatus::Failed, duration_ms);
        self.error = Some(error);
    }

    fn finish(&mut self, status: ExecutionStatus, duration_ms: u64) {
        self.status = status;
        self.ended_at = Some(Utc::now());
        self.duration_ms = Some(duration_ms);
    }

    /// Count of outcomes with the given status.
    pub fn count_outcomes(&self, status: StepStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

/// What a successful `run` hands back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub execution_id: String,
    pub results: Map<String, Value>,
    pub context: Map<String, Value>,
    pub duration_ms: u64,
    pub step_count: usize,
}

impl RunSummary {
    /// Build the summary of a completed record.
    pub fn from_record(record: &ExecutionRecord) -> Self {
        Self {
            execution_id: record.id.clone(),
            results: record.results.clone(),
            context: record.context.clone(),
            duration_ms: record.duration_ms.unwrap_or(0),
            step_count: record.outcomes.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::StepAction;
    use serde_json::json;

    fn step() -> StepSpec {
        StepSpec::new(
            "s",
            StepAction::Delegate {
                step_type: "custom".to_string(),
                params: json!({}),
            },
        )
    }

    #[test]
    fn test_new_record_is_running_with_input() {
        let record = ExecutionRecord::new(
            "e1".to_string(),
            "flow".to_string(),
            json!({"n": 1}),
            RunOptions::default(),
        );
        assert_eq!(record.status, ExecutionStatus::Running);
        assert!(!record.status.is_terminal());
        assert_eq!(record.context.get("input"), Some(&json!({"n": 1})));
        assert!(record.outcomes.is_empty());
    }

    #[test]
    fn test_complete_and_fail() {
        let mut record = ExecutionRecord::new(
            "e1".to_string(),
            "flow".to_string(),
            Value::Null,
            RunOptions::default(),
        );
        record.outcomes.push(StepOutcome::completed(step(), json!(1), 1, 3));
        record.outcomes.push(StepOutcome::failed(step(), "boom".to_string(), 2, 5));
        record.fail("boom".to_string(), 12);

        assert_eq!(record.status, ExecutionStatus::Failed);
        assert!(record.ended_at.is_some());
        assert_eq!(record.error.as_deref(), Some("boom"));
        assert_eq!(record.count_outcomes(StepStatus::Completed), 1);
        assert_eq!(record.count_outcomes(StepStatus::Failed), 1);
    }

    #[test]
    fn test_run_options_wire_names() {
        let options: RunOptions = serde_json::from_value(json!({"continueOnError": true})).unwrap();
        assert!(options.continue_on_error);
        let options: RunOptions = serde_json::from_value(json!({})).unwrap();
        assert!(!options.continue_on_error);
    }

    #[test]
    fn test_record_serialization() {
        let mut record = ExecutionRecord::new(
            "e1".to_string(),
            "flow".to_string(),
            json!({}),
            RunOptions::continue_on_error(),
        );
        record.log(LogLevel::Info, "Execution started");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["status"], json!("running"));
        assert_eq!(value["options"]["continueOnError"], json!(true));
        assert_eq!(value["logs"][0]["level"], json!("info"));
        assert!(value.get("endedAt").is_none());
    }
}
