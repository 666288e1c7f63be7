//! Stepflow Tool Library
//!
//! Leaf utilities and built-in step handlers for workflow execution.
//!
//! This crate provides:
//! - Execution context and `{{dotted.path}}` template resolution
//! - A restricted expression language for conditions and transforms
//! - Built-in tools: generate, file-operation, remote-call, transform
//! - Delegate handler registry and retry policy
//! - Directory-scoped storage backend

pub mod context;
pub mod error;
pub mod expr;
pub mod registry;
pub mod storage;
pub mod template;
pub mod tools;

pub use context::ExecutionContext;
pub use error::ToolError;
pub use expr::{ExprError, Expression};
pub use registry::{HandlerRegistry, RetryConfig, StepHandler};
pub use storage::{LocalStorage, Storage};
pub use template::TemplateResolver;
