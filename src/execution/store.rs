//! Execution Store
//!
//! The manager's table of live executions. Each execution gets one
//! [`ExecutionSlot`] holding its record behind a mutex, a watch channel that
//! publishes status changes, and a run lock that keeps passes of the execution
//! algorithm from overlapping.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Mutex, MutexGuard, RwLock};

use crate::error::{Result, WorkflowError};
use crate::workflow::{WorkflowDefinition, WorkflowExecution, WorkflowStatus};

/// Single-writer home of one execution record.
pub struct ExecutionSlot {
    id: String,
    definition: WorkflowDefinition,
    record: Mutex<WorkflowExecution>,
    status: watch::Sender<WorkflowStatus>,
    run_lock: Mutex<()>,
}

impl ExecutionSlot {
    /// Wraps an execution record and the definition that drives it.
    pub fn new(definition: WorkflowDefinition, execution: WorkflowExecution) -> Self {
        let (status, _) = watch::channel(execution.status);
        Self {
            id: execution.id.clone(),
            definition,
            record: Mutex::new(execution),
            status,
            run_lock: Mutex::new(()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn definition(&self) -> &WorkflowDefinition {
        &self.definition
    }

    /// Current status without locking the record.
    pub fn status(&self) -> WorkflowStatus {
        *self.status.borrow()
    }

    /// Clones the current record.
    pub async fn snapshot(&self) -> WorkflowExecution {
        self.record.lock().await.clone()
    }

    /// Reads from the record under its lock.
    pub async fn inspect<R>(&self, f: impl FnOnce(&WorkflowExecution) -> R) -> R {
        f(&*self.record.lock().await)
    }

    /// Applies a mutation to the record and publishes the resulting status.
    ///
    /// The closure runs under the record lock; it must not block.
    pub async fn update<R>(&self, f: impl FnOnce(&mut WorkflowExecution) -> R) -> R {
        let mut record = self.record.lock().await;
        let result = f(&mut record);
        self.status.send_replace(record.status);
        result
    }

    /// Subscribes to status changes.
    pub fn subscribe(&self) -> watch::Receiver<WorkflowStatus> {
        self.status.subscribe()
    }

    /// Wakes every status subscriber without changing the status.
    ///
    /// Called once the slot has left the table, so waiters re-check and
    /// find it gone even while a pass still holds the slot.
    pub fn retire(&self) {
        self.status.send_modify(|_| {});
    }

    /// Acquires the lock held for the duration of one execution pass.
    pub async fn lock_run(&self) -> MutexGuard<'_, ()> {
        self.run_lock.lock().await
    }
}

/// Table of executions keyed by id.
#[derive(Default)]
pub struct ExecutionStore {
    slots: RwLock<HashMap<String, Arc<ExecutionSlot>>>,
}

impl ExecutionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new slot; fails if the id is already taken.
    pub async fn insert(&self, slot: ExecutionSlot) -> Result<Arc<ExecutionSlot>> {
        let mut slots = self.slots.write().await;
        if slots.contains_key(slot.id()) {
            return Err(WorkflowError::AlreadyExists(slot.id().to_string()));
        }

        let slot = Arc::new(slot);
        slots.insert(slot.id().to_string(), Arc::clone(&slot));
        Ok(slot)
    }

    /// Gets the slot for an execution.
    pub async fn get(&self, id: &str) -> Option<Arc<ExecutionSlot>> {
        self.slots.read().await.get(id).cloned()
    }

    /// Gets the slot for an execution or fails with `NotFound`.
    pub async fn require(&self, id: &str) -> Result<Arc<ExecutionSlot>> {
        self.get(id)
            .await
            .ok_or_else(|| WorkflowError::NotFound(id.to_string()))
    }

    /// Removes an execution from the table and wakes its subscribers.
    pub async fn remove(&self, id: &str) -> Option<Arc<ExecutionSlot>> {
        let slot = self.slots.write().await.remove(id)?;
        slot.retire();
        Some(slot)
    }

    /// Returns every slot.
    pub async fn all(&self) -> Vec<Arc<ExecutionSlot>> {
        self.slots.read().await.values().cloned().collect()
    }

    /// Number of executions in the table.
    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    /// Returns true if the table is empty.
    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }
}
