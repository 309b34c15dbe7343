//! Handler Context
//!
//! [`WorkflowCtx`] is what a workflow handler receives on every pass. Each
//! step operation delegates to the [`StepExecutor`] bound to the execution,
//! so calling the same step name twice returns the first result.

use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::engine::WorkflowManager;
use super::flow::Flow;
use super::step::{EventPayload, StepExecutor, StepOptions, WaitOptions};
use crate::error::{BoxError, Result};
use crate::workflow::DurationSpec;

/// Per-pass context handed to a workflow handler.
#[derive(Clone)]
pub struct WorkflowCtx {
    steps: StepExecutor,
    manager: WorkflowManager,
}

impl WorkflowCtx {
    pub(crate) fn new(steps: StepExecutor, manager: WorkflowManager) -> Self {
        Self { steps, manager }
    }

    /// Id of the running execution.
    pub fn execution_id(&self) -> &str {
        self.steps.execution_id()
    }

    /// The underlying step executor, for calls that need explicit options.
    pub fn steps(&self) -> &StepExecutor {
        &self.steps
    }

    /// Runs a step with the engine's default retry policy.
    pub async fn run<T, F, Fut, E>(&self, name: &str, f: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<BoxError>,
        T: Serialize + DeserializeOwned,
    {
        self.steps.run(name, f, self.steps.defaults()).await
    }

    /// Runs a step with an explicit retry policy.
    pub async fn run_with<T, F, Fut, E>(&self, name: &str, f: F, options: &StepOptions) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<BoxError>,
        T: Serialize + DeserializeOwned,
    {
        self.steps.run(name, f, options).await
    }

    /// Calls a platform query as a step.
    pub async fn run_query(&self, name: &str, reference: &str, args: Value) -> Result<Value> {
        self.steps
            .run_query_step(name, reference, args, self.steps.defaults())
            .await
    }

    /// Calls a platform mutation as a step.
    pub async fn run_mutation(&self, name: &str, reference: &str, args: Value) -> Result<Value> {
        self.steps
            .run_mutation_step(name, reference, args, self.steps.defaults())
            .await
    }

    /// Calls a platform action as a step.
    pub async fn run_action(&self, name: &str, reference: &str, args: Value) -> Result<Value> {
        self.steps
            .run_action_step(name, reference, args, self.steps.defaults())
            .await
    }

    /// Sleeps as a step.
    pub async fn sleep(&self, name: &str, duration: impl Into<DurationSpec>) -> Result<()> {
        self.steps.sleep(name, duration).await
    }

    /// Waits for a signal; see [`StepExecutor::wait_for_event`].
    pub async fn wait_for_event(
        &self,
        name: &str,
        options: WaitOptions,
    ) -> Result<Flow<EventPayload>> {
        self.steps.wait_for_event(name, options).await
    }

    /// Runs step bodies concurrently as one step.
    pub async fn parallel<T, I, Fut, E>(&self, name: &str, steps: I) -> Result<Vec<T>>
    where
        I: IntoIterator<Item = Fut>,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<BoxError>,
        T: Serialize + DeserializeOwned,
    {
        self.steps.parallel(name, steps).await
    }

    /// Cancels this execution.
    ///
    /// The handler keeps running until it returns; its result is discarded.
    pub async fn cancel(&self, reason: Option<&str>) -> Result<()> {
        self.manager.cancel(self.execution_id(), reason).await
    }
}
