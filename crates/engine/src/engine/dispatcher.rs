//! Step dispatcher.
//!
//! Maps a step to its handler, resolving templates against the current
//! context first. `condition` and `parallel` recurse through
//! [`StepDispatcher::dispatch_with_retry`], so nested steps get the same
//! resolution and retry treatment as top-level ones.

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::time::Instant;

use stepflow_tools::tools::{FileTool, GenerateTool, HttpTool, TransformParams, TransformTool};
use stepflow_tools::{ExecutionContext, HandlerRegistry, TemplateResolver, ToolError};

use crate::workflow::{StepAction, StepSpec};

/// Executes single steps against an execution context.
#[derive(Debug, Clone)]
pub struct StepDispatcher {
    pub(crate) generate: GenerateTool,
    pub(crate) file: FileTool,
    pub(crate) http: HttpTool,
    pub(crate) transform: TransformTool,
    pub(crate) delegates: HandlerRegistry,
    pub(crate) resolver: TemplateResolver,
}

impl StepDispatcher {
    /// Create a dispatcher from its tools.
    pub fn new(
        generate: GenerateTool,
        file: FileTool,
        http: HttpTool,
        transform: TransformTool,
        delegates: HandlerRegistry,
    ) -> Self {
        Self {
            generate,
            file,
            http,
            transform,
            delegates,
            resolver: TemplateResolver::new(),
        }
    }

    /// Delegate handler registry.
    pub fn delegates(&self) -> &HandlerRegistry {
        &self.delegates
    }

    /// Dispatch a step once.
    pub fn dispatch<'a>(
        &'a self,
        step: &'a StepSpec,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<Value, ToolError>> {
        async move {
            tracing::debug!(
                execution_id = %ctx.execution_id,
                step_id = %step.id,
                step_type = %step.step_type(),
                "Dispatching step"
            );

            match &step.action {
                StepAction::Generate(params) => {
                    let params = self.resolver.resolve_params(params, ctx)?;
                    self.generate.execute(&params).await
                }
                StepAction::FileOperation(params) => {
                    let params = self.resolver.resolve_params(params, ctx)?;
                    self.file.execute(&params).await
                }
                StepAction::RemoteCall(params) => {
                    let params = self.resolver.resolve_params(params, ctx)?;
                    self.http.execute(&params).await
                }
                StepAction::Transform(params) => {
                    // The expression is evaluated, never spliced.
                    let params = TransformParams {
                        variable: self.resolver.resolve_str(&params.variable, ctx),
                        expression: params.expression.clone(),
                        function: params
                            .function
                            .as_ref()
                            .map(|f| self.resolver.resolve_str(f, ctx)),
                    };
                    self.transform.execute(&params, ctx)
                }
                StepAction::Condition {
                    condition,
                    true_branch,
                    false_branch,
                } => {
                    self.run_condition(
                        condition,
                        true_branch.as_deref(),
                        false_branch.as_deref(),
                        ctx,
                    )
                    .await
                }
                StepAction::Parallel { steps } => self.run_parallel(&step.id, steps, ctx).await,
                StepAction::Delegate { step_type, params } => {
                    let params = self.resolver.resolve_value(params, ctx);
                    self.delegates.execute(step_type, &params, ctx).await
                }
            }
        }
        .boxed()
    }

    /// Dispatch a step, retrying per its retry policy.
    ///
    /// Returns the final result together with the number of attempts made.
    pub async fn dispatch_with_retry(
        &self,
        step: &StepSpec,
        ctx: &ExecutionContext,
    ) -> (Result<Value, ToolError>, u32) {
        let max_retries = step.retry.as_ref().map_or(0, |r| r.max_retries);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let start = Instant::now();

            match self.dispatch(step, ctx).await {
                Ok(value) => return (Ok(value), attempt),
                Err(e) if attempt <= max_retries && e.is_retryable() => {
                    let delay = step
                        .retry
                        .as_ref()
                        .map(|r| r.delay_for(attempt))
                        .unwrap_or_default();

                    tracing::warn!(
                        execution_id = %ctx.execution_id,
                        step_id = %step.id,
                        attempt,
                        max_retries,
                        error = %e,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        delay_ms = delay.as_millis() as u64,
                        "Step failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return (Err(e), attempt),
            }
        }
    }
}
