//! Execution engine: dispatch, control flow and run state.

mod control_flow;
pub mod dispatcher;
pub mod orchestrator;
pub mod state;

pub use dispatcher::StepDispatcher;
pub use orchestrator::{EngineBuilder, EngineStats, WorkflowEngine};
pub use state::{
    ExecutionRecord, ExecutionStatus, LogEntry, LogLevel, RunOptions, RunSummary, StepOutcome,
    StepStatus,
};
