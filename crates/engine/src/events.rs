//! Execution lifecycle events.
//!
//! Observers register a callback per event kind. Emitting never waits on
//! them: callbacks run on a dedicated delivery thread, in emission order
//! and then subscription order. A callback that errors or panics is logged
//! and skipped. All events are also published on a broadcast channel for
//! async consumers.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::engine::state::{ExecutionRecord, StepOutcome};

/// Lifecycle event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    ExecutionStarted,
    StepCompleted,
    StepFailed,
    ExecutionCompleted,
    ExecutionFailed,
}

impl EventKind {
    /// Wire name of the event kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExecutionStarted => "execution-started",
            Self::StepCompleted => "step-completed",
            Self::StepFailed => "step-failed",
            Self::ExecutionCompleted => "execution-completed",
            Self::ExecutionFailed => "execution-failed",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An emitted lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionEvent {
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    /// Snapshot of the execution at emission time.
    pub execution: ExecutionRecord,
    /// Outcome for step events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<StepOutcome>,
}

/// Observer callback.
pub type EventHandler = Arc<dyn Fn(&ExecutionEvent) -> anyhow::Result<()> + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    kind: EventKind,
    handler: EventHandler,
}

enum Delivery {
    Event {
        event: ExecutionEvent,
        handlers: Vec<(SubscriptionId, EventHandler)>,
    },
    Flush(oneshot::Sender<()>),
}

/// Fan-out of lifecycle events to observers.
pub struct EventBus {
    subscriptions: RwLock<Vec<Subscription>>,
    next_id: AtomicU64,
    sender: broadcast::Sender<ExecutionEvent>,
    deliveries: mpsc::UnboundedSender<Delivery>,
}

impl EventBus {
    /// Create a bus whose broadcast channel holds `buffer` events.
    ///
    /// Starts the delivery thread; it exits once the bus is dropped.
    pub fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer.max(1));
        let (deliveries, queue) = mpsc::unbounded_channel();

        if let Err(e) = std::thread::Builder::new()
            .name("stepflow-events".to_string())
            .spawn(move || deliver_loop(queue))
        {
            tracing::warn!(error = %e, "Failed to start event delivery thread, delivering inline");
        }

        Self {
            subscriptions: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            sender,
            deliveries,
        }
    }

    /// Register a callback for one event kind.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&ExecutionEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions.write().push(Subscription {
            id,
            kind,
            handler: Arc::new(handler),
        });
        id
    }

    /// Remove a subscription. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscriptions.write();
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() != before
    }

    /// Number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Receiver for every event emitted from now on.
    pub fn receiver(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.sender.subscribe()
    }

    /// Publish an event without waiting for observers.
    ///
    /// Callbacks subscribed to `kind` at this moment are queued for the
    /// delivery thread, which runs them in emission order and, per event,
    /// in subscription order.
    pub fn emit(&self, kind: EventKind, execution: &ExecutionRecord, outcome: Option<&StepOutcome>) {
        let event = ExecutionEvent {
            kind,
            timestamp: Utc::now(),
            execution: execution.clone(),
            outcome: outcome.cloned(),
        };

        let handlers: Vec<(SubscriptionId, EventHandler)> = self
            .subscriptions
            .read()
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| (s.id, s.handler.clone()))
            .collect();

        // No receivers is fine.
        let _ = self.sender.send(event.clone());

        if handlers.is_empty() {
            return;
        }
        if let Err(mpsc::error::SendError(delivery)) =
            self.deliveries.send(Delivery::Event { event, handlers })
        {
            deliver(delivery);
        }
    }

    /// Wait until every event emitted so far has reached its callbacks.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.deliveries.send(Delivery::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

fn deliver_loop(mut queue: mpsc::UnboundedReceiver<Delivery>) {
    while let Some(delivery) = queue.blocking_recv() {
        deliver(delivery);
    }
}

fn deliver(delivery: Delivery) {
    let (event, handlers) = match delivery {
        Delivery::Event { event, handlers } => (event, handlers),
        Delivery::Flush(done) => {
            let _ = done.send(());
            return;
        }
    };

    for (id, handler) in handlers {
        match catch_unwind(AssertUnwindSafe(|| handler(&event))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(
                    execution_id = %event.execution.id,
                    event = %event.kind,
                    subscription = id.0,
                    error = %e,
                    "Event handler returned an error"
                );
            }
            Err(_) => {
                tracing::warn!(
                    execution_id = %event.execution.id,
                    event = %event.kind,
                    subscription = id.0,
                    "Event handler panicked"
                );
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("receivers", &self.sender.receiver_count())
            .finish()
    }
}
