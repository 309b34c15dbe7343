//! Workflow Manager
//!
//! The manager owns the registry of workflow definitions and the table of
//! live executions. It:
//! - Starts executions on their own tokio task and hands back a handle
//! - Drives handlers through a [`WorkflowCtx`] bound to a step executor
//! - Enforces workflow-level timeouts
//! - Resumes suspended executions when a signal delivers their event
//! - Restores persisted snapshots after a restart
//!
//! Every dispatch runs one pass of the execution algorithm: mark the
//! execution running, invoke the handler, then settle the outcome. Completed
//! steps replay from cache, so a pass started by a signal fast-forwards to the
//! step that was waiting.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use serde_json::Value;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinError;

use super::backend::{Persistence, Platform};
use super::context::WorkflowCtx;
use super::flow::Flow;
use super::handle::WorkflowHandle;
use super::step::{EventPayload, StepExecutor};
use super::store::{ExecutionSlot, ExecutionStore};
use crate::config::EngineConfig;
use crate::error::{Result, WorkflowError};
use crate::monitoring::ExecutionTimeline;
use crate::workflow::{
    generate_execution_id, DurationSpec, ErrorInfo, HandlerResult, WorkflowDefinition,
    WorkflowExecution, WorkflowStatus,
};

/// Per-start overrides.
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    /// Caller-supplied execution id; generated when absent
    pub id: Option<String>,

    /// Workflow timeout, overriding the definition and engine defaults
    pub timeout: Option<DurationSpec>,

    /// Retry budget, overriding the definition and engine defaults
    pub max_retries: Option<u32>,
}

impl StartOptions {
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_timeout(mut self, timeout: impl Into<DurationSpec>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }
}

/// Filter for [`WorkflowManager::list_executions`].
#[derive(Debug, Clone, Default)]
pub struct ExecutionFilter {
    pub status: Option<WorkflowStatus>,
    pub name: Option<String>,
}

impl ExecutionFilter {
    pub fn with_status(mut self, status: WorkflowStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns true if the execution passes every set criterion.
    pub fn matches(&self, execution: &WorkflowExecution) -> bool {
        self.status.map_or(true, |status| execution.status == status)
            && self
                .name
                .as_deref()
                .map_or(true, |name| execution.name == name)
    }
}

/// How one pass of the handler ended.
enum PassOutcome {
    Completed(Value),
    Suspended,
    Failed(ErrorInfo),
    TimedOut(u64),
}

impl PassOutcome {
    fn from_join(joined: std::result::Result<HandlerResult, JoinError>) -> Self {
        match joined {
            Ok(Ok(Flow::Continue(value))) => Self::Completed(value),
            Ok(Ok(Flow::Suspend)) => Self::Suspended,
            Ok(Err(err)) => Self::Failed(ErrorInfo::from_error(&*err)),
            Err(join_err) => Self::Failed(ErrorInfo::new(join_failure_message(join_err))),
        }
    }
}

fn join_failure_message(err: JoinError) -> String {
    if !err.is_panic() {
        return "Workflow handler task was aborted".to_string();
    }

    let payload = err.into_panic();
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());

    format!("Workflow handler panicked: {}", detail)
}

struct ManagerInner {
    definitions: RwLock<HashMap<String, WorkflowDefinition>>,
    executions: ExecutionStore,
    platform: Arc<dyn Platform>,
    persistence: Arc<dyn Persistence>,
    config: EngineConfig,
}

/// Registry of workflow definitions and table of their executions.
///
/// Cloning is cheap; clones share the same state.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use serde_json::{json, Value};
/// use steprunner::execution::{MemoryPersistence, NoPlatform, StartOptions, WorkflowCtx, WorkflowManager};
/// use steprunner::workflow::{define_workflow, HandlerResult, WorkflowConfig};
///
/// async fn greet(ctx: WorkflowCtx, args: Value) -> HandlerResult {
///     let name: String = ctx
///         .run("lookup", || async { Ok::<_, steprunner::BoxError>("world".to_string()) })
///         .await?;
///     Ok(json!({ "greeting": format!("hello {}", name), "args": args }).into())
/// }
///
/// # async fn demo() -> steprunner::Result<()> {
/// let manager = WorkflowManager::new(Arc::new(NoPlatform), Arc::new(MemoryPersistence::new()));
/// let definition = define_workflow("greet", WorkflowConfig::default(), greet);
/// manager.register(definition.clone()).await;
///
/// let handle = manager.start(&definition, json!({}), StartOptions::default()).await?;
/// let result = handle.result().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct WorkflowManager {
    inner: Arc<ManagerInner>,
}

impl WorkflowManager {
    /// Creates a manager with the default engine configuration.
    pub fn new(platform: Arc<dyn Platform>, persistence: Arc<dyn Persistence>) -> Self {
        Self::with_config(platform, persistence, EngineConfig::default())
    }

    /// Creates a manager with explicit engine configuration.
    pub fn with_config(
        platform: Arc<dyn Platform>,
        persistence: Arc<dyn Persistence>,
        config: EngineConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                definitions: RwLock::new(HashMap::new()),
                executions: ExecutionStore::new(),
                platform,
                persistence,
                config,
            }),
        }
    }

    /// Engine configuration in effect.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Registers a definition, replacing any previous one with the same name.
    pub async fn register(&self, definition: WorkflowDefinition) {
        let mut definitions = self.inner.definitions.write().await;
        if definitions.contains_key(definition.name()) {
            warn!("Replacing workflow definition '{}'", definition.name());
        } else {
            debug!("Registered workflow definition '{}'", definition.name());
        }
        definitions.insert(definition.name().to_string(), definition);
    }

    /// Looks up a registered definition.
    pub async fn definition(&self, name: &str) -> Option<WorkflowDefinition> {
        self.inner.definitions.read().await.get(name).cloned()
    }

    /// Names of all registered definitions, sorted.
    pub async fn definitions(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.definitions.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Starts an execution of `definition` and returns immediately.
    ///
    /// Timeout and retry budget resolve as start options, then definition
    /// config, then engine defaults. Fails before dispatch if a supplied id is
    /// already taken or a timeout does not parse; failures after dispatch are
    /// recorded on the execution and observed through its handle.
    pub async fn start(
        &self,
        definition: &WorkflowDefinition,
        args: Value,
        options: StartOptions,
    ) -> Result<WorkflowHandle> {
        let config = definition.config();
        let defaults = &self.inner.config;

        let max_retries = options
            .max_retries
            .or(config.max_retries)
            .unwrap_or(defaults.default_max_retries);

        let timeout = options
            .timeout
            .as_ref()
            .or(config.timeout.as_ref())
            .or(defaults.default_timeout.as_ref())
            .map(DurationSpec::as_millis)
            .transpose()?;

        let id = options.id.unwrap_or_else(generate_execution_id);
        let execution = WorkflowExecution::new(id, definition.name(), args, max_retries, timeout);
        let slot = self
            .inner
            .executions
            .insert(ExecutionSlot::new(definition.clone(), execution))
            .await?;

        info!(
            "Starting workflow '{}' as execution {}",
            definition.name(),
            slot.id()
        );

        self.save_snapshot(&slot).await;
        let handle = WorkflowHandle::new(slot.id(), self.clone());
        self.dispatch(slot);

        Ok(handle)
    }

    /// Starts a registered definition by name.
    pub async fn start_by_name(
        &self,
        name: &str,
        args: Value,
        options: StartOptions,
    ) -> Result<WorkflowHandle> {
        let definition = self
            .definition(name)
            .await
            .ok_or_else(|| WorkflowError::DefinitionNotFound(name.to_string()))?;

        self.start(&definition, args, options).await
    }

    /// Adopts a persisted execution snapshot.
    ///
    /// The handler is resolved from the registry by the execution's name.
    /// Non-terminal executions are dispatched again; completed steps replay
    /// from the snapshot.
    pub async fn restore(&self, mut execution: WorkflowExecution) -> Result<WorkflowHandle> {
        let definition = self
            .definition(&execution.name)
            .await
            .ok_or_else(|| WorkflowError::DefinitionNotFound(execution.name.clone()))?;

        execution.reindex();
        let resume = !execution.status.is_terminal();
        let slot = self
            .inner
            .executions
            .insert(ExecutionSlot::new(definition, execution))
            .await?;

        let handle = WorkflowHandle::new(slot.id(), self.clone());
        if resume {
            info!("Resuming restored execution {}", slot.id());
            self.dispatch(slot);
        } else {
            debug!("Restored terminal execution {}", slot.id());
        }

        Ok(handle)
    }

    /// Cancels a pending or running execution.
    ///
    /// Cancellation is advisory: a handler that is mid-pass keeps running,
    /// but its outcome no longer changes the execution.
    pub async fn cancel(&self, id: &str, reason: Option<&str>) -> Result<()> {
        let slot = self.inner.executions.require(id).await?;

        slot.update(|rec| {
            if rec.status.is_terminal() {
                return Err(WorkflowError::InvalidState {
                    id: rec.id.clone(),
                    status: rec.status,
                    operation: "cancel",
                });
            }
            if let Some(reason) = reason {
                rec.error = Some(ErrorInfo::new(reason));
            }
            rec.finish(WorkflowStatus::Cancelled);
            Ok(())
        })
        .await?;

        info!(
            "Execution {} cancelled{}",
            id,
            reason.map(|r| format!(": {}", r)).unwrap_or_default()
        );
        self.save_snapshot(&slot).await;
        Ok(())
    }

    /// Delivers an event to the first step waiting for one, then resumes.
    pub async fn signal(&self, id: &str, event_type: &str, payload: Value) -> Result<()> {
        self.deliver(id, None, event_type, payload).await
    }

    /// Delivers an event to a named waiting step, then resumes.
    pub async fn signal_step(
        &self,
        id: &str,
        step: &str,
        event_type: &str,
        payload: Value,
    ) -> Result<()> {
        self.deliver(id, Some(step), event_type, payload).await
    }

    async fn deliver(
        &self,
        id: &str,
        target: Option<&str>,
        event_type: &str,
        payload: Value,
    ) -> Result<()> {
        let slot = self.inner.executions.require(id).await?;
        let event = serde_json::to_value(EventPayload::new(event_type, payload))?;

        let step = slot
            .update(|rec| -> Result<String> {
                if rec.status != WorkflowStatus::Running {
                    return Err(WorkflowError::InvalidState {
                        id: rec.id.clone(),
                        status: rec.status,
                        operation: "signal",
                    });
                }

                let waiting = match target {
                    Some(name) => rec.step(name).filter(|step| step.is_waiting()),
                    None => rec.first_waiting_step(),
                };
                let name = waiting.map(|step| step.name.clone()).ok_or_else(|| {
                    WorkflowError::NoWaitingStep {
                        id: rec.id.clone(),
                        step: target.map(str::to_string),
                    }
                })?;

                rec.step_entry(&name).complete(event);
                Ok(name)
            })
            .await?;

        info!(
            "Delivered event '{}' to step '{}' of execution {}",
            event_type, step, id
        );

        self.save_snapshot(&slot).await;
        self.dispatch(slot);
        Ok(())
    }

    /// Returns a snapshot of an execution.
    pub async fn get_execution(&self, id: &str) -> Option<WorkflowExecution> {
        match self.inner.executions.get(id).await {
            Some(slot) => Some(slot.snapshot().await),
            None => None,
        }
    }

    /// Current status of an execution.
    pub async fn status(&self, id: &str) -> Result<WorkflowStatus> {
        Ok(self.inner.executions.require(id).await?.status())
    }

    /// Snapshots of every execution matching the filter, oldest first.
    pub async fn list_executions(&self, filter: &ExecutionFilter) -> Vec<WorkflowExecution> {
        let mut executions = Vec::new();
        for slot in self.inner.executions.all().await {
            let snapshot = slot.snapshot().await;
            if filter.matches(&snapshot) {
                executions.push(snapshot);
            }
        }

        executions.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
        executions
    }

    /// Forgets an execution, returning its last snapshot.
    ///
    /// Waiters on its result observe `NotFound`.
    pub async fn remove_execution(&self, id: &str) -> Option<WorkflowExecution> {
        let slot = self.inner.executions.remove(id).await?;
        debug!("Removed execution {}", id);
        Some(slot.snapshot().await)
    }

    /// Returns a handle for an existing execution.
    pub async fn handle(&self, id: &str) -> Result<WorkflowHandle> {
        let slot = self.inner.executions.require(id).await?;
        Ok(WorkflowHandle::new(slot.id(), self.clone()))
    }

    pub(crate) async fn contains(&self, id: &str) -> bool {
        self.inner.executions.get(id).await.is_some()
    }

    pub(crate) async fn subscribe(&self, id: &str) -> Result<watch::Receiver<WorkflowStatus>> {
        Ok(self.inner.executions.require(id).await?.subscribe())
    }

    /// Spawns one pass of the execution algorithm.
    fn dispatch(&self, slot: Arc<ExecutionSlot>) {
        let manager = self.clone();
        tokio::spawn(async move {
            manager.execute(slot).await;
        });
    }

    async fn execute(&self, slot: Arc<ExecutionSlot>) {
        let _pass = slot.lock_run().await;

        let begun = slot
            .update(|rec| {
                if rec.status.is_terminal() {
                    return None;
                }
                rec.status = WorkflowStatus::Running;
                Some((rec.args.clone(), rec.timeout))
            })
            .await;

        let Some((args, timeout)) = begun else {
            debug!("Execution {} already settled, skipping pass", slot.id());
            return;
        };

        self.save_snapshot(&slot).await;
        debug!("Running pass of execution {}", slot.id());

        let steps = StepExecutor::new(
            Arc::clone(&slot),
            Arc::clone(&self.inner.platform),
            Arc::clone(&self.inner.persistence),
            self.inner.config.step_defaults.clone(),
        );
        let ctx = WorkflowCtx::new(steps, self.clone());
        let task = tokio::spawn(slot.definition().invoke(ctx, args));

        let outcome = match timeout {
            Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), task).await {
                Ok(joined) => PassOutcome::from_join(joined),
                Err(_) => PassOutcome::TimedOut(ms),
            },
            None => PassOutcome::from_join(task.await),
        };

        self.settle(&slot, outcome).await;
    }

    /// Applies a pass outcome unless the execution already went terminal.
    async fn settle(&self, slot: &ExecutionSlot, outcome: PassOutcome) {
        let id = slot.id();

        let settled = slot
            .update(|rec| {
                if rec.status.is_terminal() {
                    return None;
                }
                match outcome {
                    PassOutcome::Completed(value) => {
                        rec.result = Some(value);
                        rec.finish(WorkflowStatus::Completed);
                    }
                    PassOutcome::Suspended => {}
                    PassOutcome::Failed(info) => {
                        rec.error = Some(info);
                        rec.finish(WorkflowStatus::Failed);
                    }
                    PassOutcome::TimedOut(ms) => {
                        rec.error = Some(ErrorInfo::new(format!(
                            "Workflow timed out after {}ms",
                            ms
                        )));
                        rec.finish(WorkflowStatus::TimedOut);
                    }
                }
                Some((rec.status, rec.error.as_ref().map(|e| e.message.clone())))
            })
            .await;

        match settled {
            None => {
                info!("Execution {} settled elsewhere; discarding pass outcome", id);
                return;
            }
            Some((WorkflowStatus::Running, _)) => {
                info!("Execution {} suspended", id);
                return;
            }
            Some((WorkflowStatus::Completed, _)) => {
                info!("Execution {} completed", id);
                let snapshot = slot.snapshot().await;
                debug!("\n{}", ExecutionTimeline::from_execution(&snapshot).gantt_chart());
            }
            Some((status, message)) => {
                error!(
                    "Execution {} {}: {}",
                    id,
                    status,
                    message.unwrap_or_default()
                );
            }
        }

        self.save_snapshot(slot).await;
    }

    /// Persists the execution; failures are logged, not propagated.
    async fn save_snapshot(&self, slot: &ExecutionSlot) {
        if !slot.definition().config().persist {
            return;
        }

        let snapshot = slot.snapshot().await;
        if let Err(e) = self.inner.persistence.save_execution(&snapshot).await {
            error!("Failed to persist execution {}: {}", slot.id(), e);
        }
    }
}
