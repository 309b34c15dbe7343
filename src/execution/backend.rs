//! Injected Collaborators
//!
//! The engine has no network surface of its own. It talks to the outside
//! world through two traits supplied when constructing a manager:
//!
//! - [`Platform`]: query/mutation/action calls into the surrounding data
//!   platform
//! - [`Persistence`]: durable snapshots of execution records
//!
//! A persistence failure propagates out of the step that triggered it exactly
//! like a failing step body.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::BoxError;
use crate::workflow::WorkflowExecution;

/// Calls into the backend data platform.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Read-only call.
    async fn run_query(&self, reference: &str, args: Value) -> Result<Value, BoxError>;

    /// Write call.
    async fn run_mutation(&self, reference: &str, args: Value) -> Result<Value, BoxError>;

    /// Call with external side effects.
    async fn run_action(&self, reference: &str, args: Value) -> Result<Value, BoxError>;
}

/// Durable sink for execution snapshots.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Persists a snapshot of the execution.
    async fn save_execution(&self, execution: &WorkflowExecution) -> Result<(), BoxError>;
}

/// Platform that rejects every call; for managers that only run plain steps.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPlatform;

#[async_trait]
impl Platform for NoPlatform {
    async fn run_query(&self, reference: &str, _args: Value) -> Result<Value, BoxError> {
        Err(format!("No data platform configured for query '{}'", reference).into())
    }

    async fn run_mutation(&self, reference: &str, _args: Value) -> Result<Value, BoxError> {
        Err(format!("No data platform configured for mutation '{}'", reference).into())
    }

    async fn run_action(&self, reference: &str, _args: Value) -> Result<Value, BoxError> {
        Err(format!("No data platform configured for action '{}'", reference).into())
    }
}

/// Keeps the latest snapshot of every execution in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryPersistence {
    snapshots: Arc<Mutex<HashMap<String, WorkflowExecution>>>,
    saves: Arc<Mutex<usize>>,
}

impl MemoryPersistence {
    /// Creates an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the latest snapshot saved for an execution.
    pub async fn get(&self, id: &str) -> Option<WorkflowExecution> {
        self.snapshots.lock().await.get(id).cloned()
    }

    /// Returns every stored snapshot.
    pub async fn all(&self) -> Vec<WorkflowExecution> {
        self.snapshots.lock().await.values().cloned().collect()
    }

    /// Total number of `save_execution` calls received.
    pub async fn save_count(&self) -> usize {
        *self.saves.lock().await
    }
}

#[async_trait]
impl Persistence for MemoryPersistence {
    async fn save_execution(&self, execution: &WorkflowExecution) -> Result<(), BoxError> {
        *self.saves.lock().await += 1;
        self.snapshots
            .lock()
            .await
            .insert(execution.id.clone(), execution.clone());
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Collaborators used by the engine's unit tests.

    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Platform that echoes `{kind, reference, args}` and records each call.
    #[derive(Default, Clone)]
    pub struct EchoPlatform {
        pub calls: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl EchoPlatform {
        async fn echo(&self, kind: &str, reference: &str, args: Value) -> Result<Value, BoxError> {
            self.calls
                .lock()
                .await
                .push((kind.to_string(), reference.to_string()));
            Ok(serde_json::json!({ "kind": kind, "reference": reference, "args": args }))
        }
    }

    #[async_trait]
    impl Platform for EchoPlatform {
        async fn run_query(&self, reference: &str, args: Value) -> Result<Value, BoxError> {
            self.echo("query", reference, args).await
        }

        async fn run_mutation(&self, reference: &str, args: Value) -> Result<Value, BoxError> {
            self.echo("mutation", reference, args).await
        }

        async fn run_action(&self, reference: &str, args: Value) -> Result<Value, BoxError> {
            self.echo("action", reference, args).await
        }
    }

    /// Persistence that can be switched to reject every save.
    #[derive(Default, Clone)]
    pub struct FlakyPersistence {
        pub failing: Arc<AtomicBool>,
        pub inner: MemoryPersistence,
    }

    impl FlakyPersistence {
        pub fn failing() -> Self {
            let persistence = Self::default();
            persistence.failing.store(true, Ordering::SeqCst);
            persistence
        }
    }

    #[async_trait]
    impl Persistence for FlakyPersistence {
        async fn save_execution(&self, execution: &WorkflowExecution) -> Result<(), BoxError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err("snapshot store unavailable".into());
            }
            self.inner.save_execution(execution).await
        }
    }
}
