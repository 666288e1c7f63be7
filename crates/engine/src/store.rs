//! In-memory execution store with bounded retention.

use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};

use crate::engine::state::{ExecutionRecord, ExecutionStatus};

#[derive(Debug, Default)]
struct StoreInner {
    records: HashMap<String, ExecutionRecord>,
    /// Insertion order, oldest first.
    order: VecDeque<String>,
}

/// Execution records keyed by id.
///
/// Holds at most `capacity` records once enough of them are terminal:
/// the oldest terminal records are evicted first and running records
/// are never evicted.
#[derive(Debug)]
pub struct ExecutionStore {
    inner: RwLock<StoreInner>,
    capacity: usize,
}

impl ExecutionStore {
    /// Create a store retaining up to `capacity` records.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            capacity: capacity.max(1),
        }
    }

    /// Insert a new record, evicting old terminal records if over capacity.
    pub fn insert(&self, record: ExecutionRecord) {
        let mut inner = self.inner.write();
        let id = record.id.clone();
        if inner.records.insert(id.clone(), record).is_none() {
            inner.order.push_back(id);
        }
        Self::evict(&mut inner, self.capacity);
    }

    /// Replace the stored snapshot of an existing record.
    pub fn update(&self, record: &ExecutionRecord) {
        let mut inner = self.inner.write();
        let terminal = record.status.is_terminal();
        if let Some(slot) = inner.records.get_mut(&record.id) {
            *slot = record.clone();
        }
        if terminal {
            Self::evict(&mut inner, self.capacity);
        }
    }

    fn evict(inner: &mut StoreInner, capacity: usize) {
        while inner.records.len() > capacity {
            let StoreInner { records, order } = &mut *inner;
            let position = order.iter().position(|id| {
                records
                    .get(id)
                    .is_some_and(|r| r.status != ExecutionStatus::Running)
            });

            match position.and_then(|pos| order.remove(pos)) {
                Some(id) => {
                    records.remove(&id);
                    tracing::debug!(execution_id = %id, "Evicted execution record");
                }
                None => break,
            }
        }
    }

    /// Get a record snapshot by id.
    pub fn get(&self, id: &str) -> Option<ExecutionRecord> {
        self.inner.read().records.get(id).cloned()
    }

    /// All records, oldest first.
    pub fn list(&self) -> Vec<ExecutionRecord> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.records.get(id).cloned())
            .collect()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of records still running.
    pub fn running_count(&self) -> usize {
        self.inner
            .read()
            .records
            .values()
            .filter(|r| r.status == ExecutionStatus::Running)
            .count()
    }

    /// Retention capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ExecutionStore {
    fn default() -> Self {
        Self::new(1000)
    }
}
