//! Workflow engine.
//!
//! Drives a run through its state machine:
//! created → running → completed | failed.
//!
//! Steps execute in declaration order against a context that grows as
//! step outputs are bound. The record is snapshotted into the execution
//! store and published on the event bus after every transition.

use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

use stepflow_tools::tools::{
    FileTool, GenerateTool, HttpTextGenerator, HttpTool, TextGenerator, TransformTool,
};
use stepflow_tools::{ExecutionContext, HandlerRegistry, LocalStorage, StepHandler, Storage, ToolError};

use crate::config::EngineConfig;
use crate::engine::dispatcher::StepDispatcher;
use crate::engine::state::{
    ExecutionRecord, LogLevel, RunOptions, RunSummary, StepOutcome, StepStatus,
};
use crate::error::{EngineError, EngineResult};
use crate::events::{EventBus, EventKind, ExecutionEvent, SubscriptionId};
use crate::registry::WorkflowRegistry;
use crate::store::ExecutionStore;
use crate::workflow::{StepSpec, WorkflowDefinition, WorkflowDocument, WorkflowSummary};

/// Engine-wide counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    /// Caller-registered workflows.
    pub registered_count: usize,
    /// Built-in catalog workflows.
    pub template_count: usize,
    /// Runs currently in progress.
    pub running_count: usize,
    /// Execution records held in the store.
    pub total_count: usize,
}

struct EngineInner {
    config: EngineConfig,
    registry: WorkflowRegistry,
    dispatcher: StepDispatcher,
    store: ExecutionStore,
    events: EventBus,
}

/// In-process workflow engine. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct WorkflowEngine {
    inner: Arc<EngineInner>,
}

/// Builder for [`WorkflowEngine`].
pub struct EngineBuilder {
    config: EngineConfig,
    generator: Option<Arc<dyn TextGenerator>>,
    storage: Option<Arc<dyn Storage>>,
    http_client: Option<reqwest::Client>,
    delegates: HandlerRegistry,
    transform: TransformTool,
    builtin_catalog: bool,
}

impl EngineBuilder {
    fn new(config: EngineConfig) -> Self {
        Self {
            config,
            generator: None,
            storage: None,
            http_client: None,
            delegates: HandlerRegistry::new(),
            transform: TransformTool::new(),
            builtin_catalog: true,
        }
    }

    /// Text generator for `generate` steps.
    ///
    /// Without one, `generator_url` from the config is used if set.
    pub fn text_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Storage backend for `file-operation` steps (default: config `storage_root`).
    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// HTTP client for `remote-call` steps.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Register a delegate handler for a custom step type.
    pub fn handler<H: StepHandler + 'static>(mut self, step_type: impl Into<String>, handler: H) -> Self {
        self.delegates.register(step_type, handler);
        self
    }

    /// Register a named transform function.
    pub fn transform_function<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, ToolError> + Send + Sync + 'static,
    {
        self.transform.register(name, function);
        self
    }

    /// Skip loading the built-in catalog.
    pub fn without_builtin_catalog(mut self) -> Self {
        self.builtin_catalog = false;
        self
    }

    /// Build the engine.
    pub fn build(self) -> EngineResult<WorkflowEngine> {
        let registry = if self.builtin_catalog {
            WorkflowRegistry::with_builtin_catalog()?
        } else {
            WorkflowRegistry::new()
        };

        let generator = self.generator.or_else(|| {
            self.config.generator_url.as_ref().map(|url| {
                Arc::new(HttpTextGenerator::new(url.clone(), self.config.http_timeout()))
                    as Arc<dyn TextGenerator>
            })
        });

        let storage = self
            .storage
            .unwrap_or_else(|| {
                Arc::new(LocalStorage::new(self.config.storage_root.clone())) as Arc<dyn Storage>
            });

        let http = match self.http_client {
            Some(client) => HttpTool::with_client(client),
            None => HttpTool::new(self.config.http_timeout()),
        };

        let dispatcher = StepDispatcher::new(
            GenerateTool::new(generator),
            FileTool::new(storage),
            http,
            self.transform,
            self.delegates,
        );

        tracing::info!(
            templates = registry.template_count(),
            delegates = ?dispatcher.delegates().list(),
            retention = self.config.execution_retention,
            "Workflow engine ready"
        );

        Ok(WorkflowEngine {
            inner: Arc::new(EngineInner {
                store: ExecutionStore::new(self.config.execution_retention),
                events: EventBus::new(self.config.event_buffer),
                config: self.config,
                registry,
                dispatcher,
            }),
        })
    }
}

impl WorkflowEngine {
    /// Start building an engine.
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    /// Engine with default tools and the built-in catalog.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        Self::builder(config).build()
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Register (or replace) a workflow. Returns its registration id.
    pub fn register(
        &self,
        name: impl Into<String>,
        steps: Vec<StepSpec>,
        description: Option<String>,
    ) -> EngineResult<String> {
        self.inner.registry.register(name, steps, description)
    }

    /// Register a parsed workflow document.
    pub fn register_document(&self, doc: WorkflowDocument) -> EngineResult<String> {
        self.inner.registry.register_document(doc)
    }

    /// Look up a workflow definition.
    pub fn get_workflow(&self, name: &str) -> Option<WorkflowDefinition> {
        self.inner.registry.get(name)
    }

    /// Summaries of every resolvable workflow.
    pub fn list_workflows(&self) -> Vec<WorkflowSummary> {
        self.inner.registry.list()
    }

    /// Snapshot of an execution record.
    pub fn get_execution(&self, id: &str) -> Option<ExecutionRecord> {
        self.inner.store.get(id)
    }

    /// All retained execution records, oldest first.
    pub fn list_executions(&self) -> Vec<ExecutionRecord> {
        self.inner.store.list()
    }

    /// Engine-wide counters.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            registered_count: self.inner.registry.registered_count(),
            template_count: self.inner.registry.template_count(),
            running_count: self.inner.store.running_count(),
            total_count: self.inner.store.len(),
        }
    }

    /// Register an observer for one event kind.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&ExecutionEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.events.subscribe(kind, handler)
    }

    /// Remove an observer.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.events.unsubscribe(id)
    }

    /// Wait until observers have seen every event emitted so far.
    ///
    /// Runs never wait on observers; this is for callers that need to.
    pub async fn flush_events(&self) {
        self.inner.events.flush().await;
    }

    /// Stream of every event emitted from now on.
    pub fn events(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.inner.events.receiver()
    }

    /// Run a workflow to completion.
    ///
    /// Unknown workflows fail before any record is created. With
    /// `continue_on_error` unset, the first failing step aborts the run
    /// and its error is returned; otherwise failures are only recorded.
    pub async fn run(
        &self,
        name: &str,
        input: Value,
        options: RunOptions,
    ) -> EngineResult<RunSummary> {
        let workflow = self.inner.registry.resolve(name)?;

        let execution_id = uuid::Uuid::new_v4().to_string();
        let start = Instant::now();

        let mut record =
            ExecutionRecord::new(execution_id.clone(), workflow.name.clone(), input.clone(), options.clone());
        let mut ctx = ExecutionContext::new(execution_id.clone(), workflow.name.clone(), input);

        tracing::info!(
            execution_id = %execution_id,
            workflow = %workflow.name,
            steps = workflow.steps.len(),
            continue_on_error = options.continue_on_error,
            "Execution started"
        );
        record.log(
            LogLevel::Info,
            format!("Execution of '{}' started", workflow.name),
        );
        self.inner.store.insert(record.clone());
        self.inner.events.emit(EventKind::ExecutionStarted, &record, None);

        for step in &workflow.steps {
            let step_start = Instant::now();
            let (result, attempts) = self.inner.dispatcher.dispatch_with_retry(step, &ctx).await;
            let duration_ms = step_start.elapsed().as_millis() as u64;

            match result {
                Ok(value) => {
                    if let Some(ref var) = step.output_variable {
                        ctx.set_variable(var.clone(), value.clone());
                        record.context = ctx.variables.clone();
                    }

                    tracing::debug!(
                        execution_id = %execution_id,
                        step_id = %step.id,
                        attempts,
                        duration_ms,
                        "Step completed"
                    );
                    record.log(LogLevel::Info, format!("Step '{}' completed", step.name));

                    let outcome = StepOutcome::completed(step.clone(), value, attempts, duration_ms);
                    record.outcomes.push(outcome.clone());
                    self.inner.store.update(&record);
                    self.inner
                        .events
                        .emit(EventKind::StepCompleted, &record, Some(&outcome));
                }
                Err(error) => {
                    tracing::warn!(
                        execution_id = %execution_id,
                        step_id = %step.id,
                        attempts,
                        error = %error,
                        "Step failed"
                    );
                    record.log(
                        LogLevel::Error,
                        format!("Step '{}' failed: {}", step.name, error),
                    );

                    let outcome =
                        StepOutcome::failed(step.clone(), error.to_string(), attempts, duration_ms);
                    record.outcomes.push(outcome.clone());
                    self.inner.store.update(&record);
                    self.inner
                        .events
                        .emit(EventKind::StepFailed, &record, Some(&outcome));

                    if !options.continue_on_error {
                        let err = EngineError::StepExecution {
                            execution_id: execution_id.clone(),
                            step_id: step.id.clone(),
                            step_name: step.name.clone(),
                            source: error,
                        };
                        return Err(self.fail_run(record, err, start));
                    }
                }
            }
        }

        let results = collect_results(&workflow, &ctx);
        let duration_ms = start.elapsed().as_millis() as u64;

        let failed = record.count_outcomes(StepStatus::Failed);
        record.log(
            if failed == 0 { LogLevel::Info } else { LogLevel::Warn },
            format!(
                "Execution completed: {} steps, {} failed",
                record.outcomes.len(),
                failed
            ),
        );
        record.complete(results, duration_ms);

        tracing::info!(
            execution_id = %execution_id,
            workflow = %workflow.name,
            duration_ms,
            failed_steps = failed,
            "Execution completed"
        );

        self.inner.store.update(&record);
        self.inner
            .events
            .emit(EventKind::ExecutionCompleted, &record, None);

        Ok(RunSummary::from_record(&record))
    }

    fn fail_run(&self, mut record: ExecutionRecord, err: EngineError, start: Instant) -> EngineError {
        let duration_ms = start.elapsed().as_millis() as u64;
        record.log(LogLevel::Error, format!("Execution failed: {}", err));
        record.fail(err.to_string(), duration_ms);

        tracing::warn!(
            execution_id = %record.id,
            workflow = %record.workflow,
            duration_ms,
            error = %err,
            "Execution failed"
        );

        self.inner.store.update(&record);
        self.inner.events.emit(EventKind::ExecutionFailed, &record, None);
        err
    }
}

/// Context restricted to the declared output variables that were bound.
fn collect_results(workflow: &WorkflowDefinition, ctx: &ExecutionContext) -> Map<String, Value> {
    workflow
        .steps
        .iter()
        .filter_map(|step| step.output_variable.as_deref())
        .filter_map(|var| ctx.get_variable(var).map(|v| (var.to_string(), v.clone())))
        .collect()
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("stats", &self.stats())
            .field("events", &self.inner.events)
            .finish()
    }
}
