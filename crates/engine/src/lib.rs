//! Stepflow Engine
//!
//! In-process execution of named, multi-step workflows against a shared,
//! growing execution context.
//!
//! ```no_run
//! use serde_json::json;
//! use stepflow_engine::{EngineConfig, RunOptions, WorkflowEngine};
//!
//! # async fn demo() -> Result<(), stepflow_engine::EngineError> {
//! let engine = WorkflowEngine::new(EngineConfig::default())?;
//! let summary = engine
//!     .run("content-review", json!({"content": " draft ", "publish": false}), RunOptions::default())
//!     .await?;
//! println!("{}", summary.execution_id);
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod registry;
pub mod store;
pub mod workflow;

pub use config::EngineConfig;
pub use engine::{
    EngineBuilder, EngineStats, ExecutionRecord, ExecutionStatus, LogEntry, LogLevel, RunOptions,
    RunSummary, StepOutcome, StepStatus, WorkflowEngine,
};
pub use error::{EngineError, EngineResult};
pub use events::{EventKind, ExecutionEvent, SubscriptionId};
pub use registry::WorkflowRegistry;
pub use workflow::{StepAction, StepSpec, WorkflowDefinition, WorkflowDocument, WorkflowSummary};

pub use stepflow_tools as tools;
