//! Control-flow step types: `condition` and `parallel`.

use futures::future::join_all;
use serde_json::Value;

use stepflow_tools::{ExecutionContext, Expression, ToolError};

use crate::engine::dispatcher::StepDispatcher;
use crate::workflow::StepSpec;

impl StepDispatcher {
    /// Evaluate `condition` against the context and dispatch the taken branch.
    ///
    /// With no step for the taken branch the result is the boolean itself.
    pub(crate) async fn run_condition(
        &self,
        condition: &str,
        true_branch: Option<&StepSpec>,
        false_branch: Option<&StepSpec>,
        ctx: &ExecutionContext,
    ) -> Result<Value, ToolError> {
        let expr = Expression::parse(condition)?;
        let taken = expr.evaluate_bool(&ctx.to_value())?;

        tracing::debug!(
            execution_id = %ctx.execution_id,
            condition = %condition,
            taken,
            "Condition evaluated"
        );

        let branch = if taken { true_branch } else { false_branch };
        match branch {
            Some(step) => self.dispatch_with_retry(step, ctx).await.0,
            None => Ok(Value::Bool(taken)),
        }
    }

    /// Run sub-steps concurrently over one context snapshot.
    ///
    /// Results keep declaration order. If any sub-step fails the whole step
    /// fails with the first failure in declaration order.
    pub(crate) async fn run_parallel(
        &self,
        parent_id: &str,
        steps: &[StepSpec],
        ctx: &ExecutionContext,
    ) -> Result<Value, ToolError> {
        let results = join_all(steps.iter().map(|step| self.dispatch_with_retry(step, ctx))).await;

        let mut values = Vec::with_capacity(results.len());
        let mut failures = Vec::new();

        for (step, (result, _attempts)) in steps.iter().zip(results) {
            match result {
                Ok(value) => values.push(value),
                Err(e) => failures.push((step, e)),
            }
        }

        let failed = failures.len();
        match failures.into_iter().next() {
            None => Ok(Value::Array(values)),
            Some((step, error)) if failed == 1 => {
                tracing::warn!(
                    execution_id = %ctx.execution_id,
                    step_id = %parent_id,
                    sub_step = %step.id,
                    error = %error,
                    "Parallel sub-step failed"
                );
                Err(error)
            }
            Some((step, error)) => {
                tracing::warn!(
                    execution_id = %ctx.execution_id,
                    step_id = %parent_id,
                    failed,
                    total = steps.len(),
                    "Parallel sub-steps failed"
                );
                Err(ToolError::ExecutionFailed(format!(
                    "{} of {} parallel steps failed; first failure in '{}': {}",
                    failed,
                    steps.len(),
                    step.id,
                    error
                )))
            }
        }
    }
}
