//! Workflow registry.
//!
//! Resolution order is caller-registered definitions first, then the
//! built-in catalog. Re-registering a name replaces the previous
//! definition wholesale.

use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::catalog::builtin_workflows;
use crate::error::{EngineError, EngineResult};
use crate::workflow::{
    validate_workflow, StepSpec, WorkflowDefinition, WorkflowDocument, WorkflowSource,
    WorkflowSummary,
};

#[derive(Debug, Default)]
struct RegistryInner {
    registered: HashMap<String, WorkflowDefinition>,
    catalog: HashMap<String, WorkflowDefinition>,
}

/// Named workflow definitions.
#[derive(Debug, Default)]
pub struct WorkflowRegistry {
    inner: RwLock<RegistryInner>,
}

fn registration_id() -> String {
    format!("wf-{}", uuid::Uuid::new_v4())
}

fn definition(
    name: String,
    description: Option<String>,
    steps: Vec<StepSpec>,
    source: WorkflowSource,
) -> WorkflowDefinition {
    WorkflowDefinition {
        id: registration_id(),
        name,
        description,
        steps,
        source,
        created_at: Utc::now(),
        execution_count: 0,
    }
}

impl WorkflowRegistry {
    /// Create an empty registry with no catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry preloaded with the built-in catalog.
    pub fn with_builtin_catalog() -> EngineResult<Self> {
        let registry = Self::new();
        {
            let mut inner = registry.inner.write();
            for doc in builtin_workflows()? {
                let def = definition(doc.name, doc.description, doc.steps, WorkflowSource::Catalog);
                inner.catalog.insert(def.name.clone(), def);
            }
        }
        Ok(registry)
    }

    /// Register (or replace) a workflow. Returns its registration id.
    pub fn register(
        &self,
        name: impl Into<String>,
        steps: Vec<StepSpec>,
        description: Option<String>,
    ) -> EngineResult<String> {
        let name = name.into();
        validate_workflow(&name, &steps)?;

        let def = definition(name.clone(), description, steps, WorkflowSource::Registered);
        let id = def.id.clone();

        let replaced = self.inner.write().registered.insert(name.clone(), def).is_some();

        tracing::info!(workflow = %name, workflow_id = %id, replaced, "Workflow registered");
        Ok(id)
    }

    /// Register a parsed workflow document.
    pub fn register_document(&self, doc: WorkflowDocument) -> EngineResult<String> {
        self.register(doc.name, doc.steps, doc.description)
    }

    /// Resolve a workflow for a run, incrementing its execution counter.
    pub fn resolve(&self, name: &str) -> EngineResult<WorkflowDefinition> {
        let mut inner = self.inner.write();
        let RegistryInner {
            registered,
            catalog,
        } = &mut *inner;

        let def = registered
            .get_mut(name)
            .or_else(|| catalog.get_mut(name))
            .ok_or_else(|| EngineError::WorkflowNotFound(name.to_string()))?;

        def.execution_count += 1;
        Ok(def.clone())
    }

    /// Look up a workflow without touching its counter.
    pub fn get(&self, name: &str) -> Option<WorkflowDefinition> {
        let inner = self.inner.read();
        inner
            .registered
            .get(name)
            .or_else(|| inner.catalog.get(name))
            .cloned()
    }

    /// Check if a name resolves.
    pub fn contains(&self, name: &str) -> bool {
        let inner = self.inner.read();
        inner.registered.contains_key(name) || inner.catalog.contains_key(name)
    }

    /// Summaries of every resolvable workflow, sorted by name.
    ///
    /// Catalog entries shadowed by a registered workflow are omitted.
    pub fn list(&self) -> Vec<WorkflowSummary> {
        let inner = self.inner.read();
        let mut summaries: Vec<WorkflowSummary> = inner
            .registered
            .values()
            .chain(
                inner
                    .catalog
                    .values()
                    .filter(|def| !inner.registered.contains_key(&def.name)),
            )
            .map(WorkflowSummary::from)
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }

    /// Number of caller-registered workflows.
    pub fn registered_count(&self) -> usize {
        self.inner.read().registered.len()
    }

    /// Number of built-in catalog workflows.
    pub fn template_count(&self) -> usize {
        self.inner.read().catalog.len()
    }
}
