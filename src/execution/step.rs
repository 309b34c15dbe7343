//! Step Execution
//!
//! Runs individual steps against one execution record:
//! - Replays completed steps from their cached output
//! - Retries failing step bodies with fixed or exponential backoff
//! - Records every step status transition and persists a snapshot
//! - Sleeps, event waits and concurrent fan-out
//!
//! A step name is the memoization key. Once a step has completed, re-running
//! the handler returns the recorded output without invoking the body again,
//! which is what lets a resumed execution fast-forward to where it stopped.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::backend::{Persistence, Platform};
use super::flow::Flow;
use super::store::ExecutionSlot;
use crate::error::{BoxError, Result, WorkflowError};
use crate::workflow::{parse_duration, DurationSpec, ErrorInfo, StepExecution};

/// Retry policy for a step.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StepOptions {
    /// Retries after the first attempt (total attempts = retries + 1)
    pub retries: u32,

    /// Base delay between attempts, in milliseconds
    pub retry_delay: u64,

    /// Double the delay after every failed attempt
    pub exponential_backoff: bool,

    /// Upper bound for the backoff delay, in milliseconds
    pub max_retry_delay: u64,
}

impl Default for StepOptions {
    fn default() -> Self {
        Self {
            retries: 3,
            retry_delay: 1_000,
            exponential_backoff: true,
            max_retry_delay: 60_000,
        }
    }
}

impl StepOptions {
    /// Sets the number of retries.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Sets the base retry delay in milliseconds.
    pub fn with_retry_delay(mut self, retry_delay: u64) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Enables or disables exponential backoff.
    pub fn with_exponential_backoff(mut self, enabled: bool) -> Self {
        self.exponential_backoff = enabled;
        self
    }

    /// Sets the backoff ceiling in milliseconds.
    pub fn with_max_retry_delay(mut self, max_retry_delay: u64) -> Self {
        self.max_retry_delay = max_retry_delay;
        self
    }

    /// Delay to wait after the given zero-based attempt failed.
    ///
    /// Exponential: `min(retry_delay * 2^attempt, max_retry_delay)`.
    /// Fixed: `retry_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let ms = if self.exponential_backoff {
            let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
            self.retry_delay
                .saturating_mul(factor)
                .min(self.max_retry_delay)
        } else {
            self.retry_delay
        };
        Duration::from_millis(ms)
    }
}

/// Options recorded with an event wait.
///
/// Both fields are stored as step input for observers; the engine does not
/// enforce them.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct WaitOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<DurationSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
}

impl WaitOptions {
    /// Sets the recorded wait timeout.
    pub fn with_timeout(mut self, timeout: impl Into<DurationSpec>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }

    /// Sets the recorded event filter.
    pub fn with_filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// An event delivered to a waiting step.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EventPayload {
    #[serde(rename = "type")]
    pub event_type: String,

    #[serde(default)]
    pub payload: Value,
}

impl EventPayload {
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum PlatformCall {
    Query,
    Mutation,
    Action,
}

/// Executes steps for one workflow execution.
#[derive(Clone)]
pub struct StepExecutor {
    slot: Arc<ExecutionSlot>,
    platform: Arc<dyn Platform>,
    persistence: Arc<dyn Persistence>,
    persist: bool,
    defaults: StepOptions,
}

impl StepExecutor {
    /// Binds an executor to an execution slot.
    ///
    /// Persistence is skipped entirely when the slot's definition has
    /// `persist` turned off.
    pub fn new(
        slot: Arc<ExecutionSlot>,
        platform: Arc<dyn Platform>,
        persistence: Arc<dyn Persistence>,
        defaults: StepOptions,
    ) -> Self {
        let persist = slot.definition().config().persist;
        Self {
            slot,
            platform,
            persistence,
            persist,
            defaults,
        }
    }

    /// Id of the execution this executor writes to.
    pub fn execution_id(&self) -> &str {
        self.slot.id()
    }

    /// Retry policy used when a step is run without explicit options.
    pub fn defaults(&self) -> &StepOptions {
        &self.defaults
    }

    /// Returns a copy of a step record.
    pub async fn step(&self, name: &str) -> Option<StepExecution> {
        self.slot.inspect(|rec| rec.step(name).cloned()).await
    }

    /// Runs a step body under the retry policy, or replays its cached output.
    ///
    /// The body is invoked once per attempt, so it must be callable more than
    /// once. After the final attempt fails the step is recorded as failed and
    /// [`WorkflowError::StepFailed`] is returned.
    pub async fn run<T, F, Fut, E>(&self, name: &str, f: F, options: &StepOptions) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<BoxError>,
        T: Serialize + DeserializeOwned,
    {
        if let Some(cached) = self.cached::<T>(name).await? {
            debug!("Step '{}' replayed from cache", name);
            return Ok(cached);
        }

        self.begin(name, None).await?;

        let mut attempt: u32 = 0;
        loop {
            match f().await {
                Ok(value) => {
                    let output = serde_json::to_value(&value)?;
                    self.complete(name, output).await?;
                    return Ok(value);
                }
                Err(err) => {
                    let err: BoxError = err.into();
                    if attempt >= options.retries {
                        return Err(self.fail(name, err, attempt + 1).await);
                    }

                    let delay = options.delay_for(attempt);
                    warn!(
                        "Step '{}' attempt {}/{} failed: {}. Retrying in {:?}",
                        name,
                        attempt + 1,
                        options.retries + 1,
                        err,
                        delay
                    );

                    attempt += 1;
                    let retries = attempt;
                    self.slot
                        .update(|rec| rec.step_entry(name).retry_count = retries)
                        .await;

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Runs a query against the data platform as a step.
    pub async fn run_query_step(
        &self,
        name: &str,
        reference: &str,
        args: Value,
        options: &StepOptions,
    ) -> Result<Value> {
        self.run_platform_step(PlatformCall::Query, name, reference, args, options)
            .await
    }

    /// Runs a mutation against the data platform as a step.
    pub async fn run_mutation_step(
        &self,
        name: &str,
        reference: &str,
        args: Value,
        options: &StepOptions,
    ) -> Result<Value> {
        self.run_platform_step(PlatformCall::Mutation, name, reference, args, options)
            .await
    }

    /// Runs an action against the data platform as a step.
    pub async fn run_action_step(
        &self,
        name: &str,
        reference: &str,
        args: Value,
        options: &StepOptions,
    ) -> Result<Value> {
        self.run_platform_step(PlatformCall::Action, name, reference, args, options)
            .await
    }

    async fn run_platform_step(
        &self,
        call: PlatformCall,
        name: &str,
        reference: &str,
        args: Value,
        options: &StepOptions,
    ) -> Result<Value> {
        let platform = &self.platform;
        self.run(
            name,
            move || {
                let args = args.clone();
                async move {
                    match call {
                        PlatformCall::Query => platform.run_query(reference, args).await,
                        PlatformCall::Mutation => platform.run_mutation(reference, args).await,
                        PlatformCall::Action => platform.run_action(reference, args).await,
                    }
                }
            },
            options,
        )
        .await
    }

    /// Sleeps for a duration, recorded as a step.
    ///
    /// An already-completed sleep returns immediately, so replaying a handler
    /// after a restart does not sleep again.
    pub async fn sleep(&self, name: &str, duration: impl Into<DurationSpec>) -> Result<()> {
        if self.is_completed(name).await {
            debug!("Sleep '{}' already elapsed", name);
            return Ok(());
        }

        let ms = parse_duration(duration)?;
        self.begin(name, Some(json!(ms))).await?;

        debug!("Step '{}' sleeping for {}ms", name, ms);
        tokio::time::sleep(Duration::from_millis(ms)).await;

        self.complete(name, Value::Null).await
    }

    /// Waits for an external event delivered by a signal.
    ///
    /// Returns the delivered event once the step has completed; otherwise the
    /// step is recorded as running with `options` as input and
    /// [`Flow::Suspend`] is returned.
    pub async fn wait_for_event(
        &self,
        name: &str,
        options: WaitOptions,
    ) -> Result<Flow<EventPayload>> {
        if let Some(event) = self.cached::<EventPayload>(name).await? {
            debug!("Event for step '{}' already delivered", name);
            return Ok(Flow::Continue(event));
        }

        let input = serde_json::to_value(&options)?;
        self.begin(name, Some(input)).await?;

        info!(
            "Execution '{}' waiting for event at step '{}'",
            self.execution_id(),
            name
        );
        Ok(Flow::Suspend)
    }

    /// Runs several step bodies concurrently as one step.
    ///
    /// Every body is driven to completion. The output lists the results in
    /// input order; if any body fails, the step fails with the first error
    /// that arrived. This step is attempted once.
    pub async fn parallel<T, I, Fut, E>(&self, name: &str, steps: I) -> Result<Vec<T>>
    where
        I: IntoIterator<Item = Fut>,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Into<BoxError>,
        T: Serialize + DeserializeOwned,
    {
        if let Some(cached) = self.cached::<Vec<T>>(name).await? {
            debug!("Parallel step '{}' replayed from cache", name);
            return Ok(cached);
        }

        self.begin(name, None).await?;

        let mut pending: FuturesUnordered<_> = steps
            .into_iter()
            .enumerate()
            .map(|(index, step)| async move { (index, step.await) })
            .collect();

        let mut results: Vec<Option<T>> = Vec::new();
        results.resize_with(pending.len(), || None);
        let mut first_error: Option<BoxError> = None;

        while let Some((index, outcome)) = pending.next().await {
            match outcome {
                Ok(value) => results[index] = Some(value),
                Err(err) => {
                    if first_error.is_none() {
                        first_error = Some(err.into());
                    }
                }
            }
        }

        if let Some(err) = first_error {
            return Err(self.fail(name, err, 1).await);
        }

        let values: Vec<T> = results.into_iter().flatten().collect();
        let output = serde_json::to_value(&values)?;
        self.complete(name, output).await?;
        Ok(values)
    }

    async fn cached<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.slot.inspect(|rec| rec.completed_output(name)).await {
            Some(output) => Ok(Some(serde_json::from_value(output)?)),
            None => Ok(None),
        }
    }

    async fn is_completed(&self, name: &str) -> bool {
        self.slot
            .inspect(|rec| rec.step(name).map_or(false, StepExecution::is_completed))
            .await
    }

    async fn begin(&self, name: &str, input: Option<Value>) -> Result<()> {
        self.slot.update(|rec| rec.step_entry(name).begin(input)).await;
        debug!("Step '{}' running", name);
        self.persist().await
    }

    async fn complete(&self, name: &str, output: Value) -> Result<()> {
        self.slot
            .update(|rec| rec.step_entry(name).complete(output))
            .await;
        debug!("Step '{}' completed", name);
        self.persist().await
    }

    /// Records the failure and builds the error to return.
    ///
    /// A persistence failure while recording takes precedence.
    async fn fail(&self, name: &str, err: BoxError, attempts: u32) -> WorkflowError {
        let info = ErrorInfo::from_error(&*err);
        let recorded = info.clone();
        self.slot
            .update(|rec| rec.step_entry(name).fail(recorded))
            .await;

        error!(
            "Step '{}' failed after {} attempt(s): {}",
            name, attempts, info.message
        );

        if let Err(persist_err) = self.persist().await {
            return persist_err;
        }

        WorkflowError::StepFailed {
            step: name.to_string(),
            attempts,
            message: info.message,
            source: err,
        }
    }

    async fn persist(&self) -> Result<()> {
        if !self.persist {
            return Ok(());
        }

        let snapshot = self.slot.snapshot().await;
        self.persistence
            .save_execution(&snapshot)
            .await
            .map_err(|e| WorkflowError::persistence(self.slot.id(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::backend::testing::{EchoPlatform, FlakyPersistence};
    use crate::execution::backend::MemoryPersistence;
    use crate::execution::WorkflowCtx;
    use crate::workflow::{
        define_workflow, HandlerResult, StepStatus, WorkflowConfig, WorkflowExecution,
    };
    use futures::FutureExt;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use tokio::sync::Mutex;
    use tokio::time::Instant;

    async fn echo(_ctx: WorkflowCtx, args: Value) -> HandlerResult {
        Ok(args.into())
    }

    fn slot_with(config: WorkflowConfig) -> Arc<ExecutionSlot> {
        let def = define_workflow("test", config, echo);
        Arc::new(ExecutionSlot::new(
            def,
            WorkflowExecution::new("exec-1", "test", Value::Null, 3, None),
        ))
    }

    fn executor(persistence: Arc<dyn Persistence>) -> StepExecutor {
        StepExecutor::new(
            slot_with(WorkflowConfig::default()),
            Arc::new(EchoPlatform::default()),
            persistence,
            StepOptions::default(),
        )
    }

    fn fast() -> StepOptions {
        StepOptions::default().with_retries(0)
    }

    #[tokio::test]
    async fn test_completed_step_is_replayed() {
        let store = MemoryPersistence::new();
        let exec = executor(Arc::new(store.clone()));

        let first: u32 = exec
            .run("a", || async { Ok::<_, BoxError>(1) }, &fast())
            .await
            .unwrap();
        assert_eq!(first, 1);
        let saves = store.save_count().await;

        let calls = AtomicU32::new(0);
        let second: u32 = exec
            .run(
                "a",
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, BoxError>(2) }
                },
                &fast(),
            )
            .await
            .unwrap();

        assert_eq!(second, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.save_count().await, saves);
    }

    #[tokio::test]
    async fn test_run_records_transitions() {
        let store = MemoryPersistence::new();
        let exec = executor(Arc::new(store.clone()));

        exec.run("a", || async { Ok::<_, BoxError>("x".to_string()) }, &fast())
            .await
            .unwrap();

        // running + completed
        assert_eq!(store.save_count().await, 2);
        let step = exec.step("a").await.unwrap();
        assert_eq!(step.status, StepStatus::Completed);
        assert_eq!(step.output, Some(json!("x")));
        assert!(step.start_time.is_some());
        assert!(step.end_time.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_backoff_schedule() {
        let exec = executor(Arc::new(MemoryPersistence::new()));
        let options = StepOptions::default()
            .with_retries(3)
            .with_retry_delay(100)
            .with_exponential_backoff(true)
            .with_max_retry_delay(60_000);

        let log: Mutex<Vec<Instant>> = Mutex::new(Vec::new());
        let attempts = &log;
        let result: Result<u32> = exec
            .run(
                "flaky",
                move || async move {
                    attempts.lock().await.push(Instant::now());
                    Err::<u32, BoxError>("still broken".into())
                },
                &options,
            )
            .await;

        let attempts = log.into_inner();
        assert_eq!(attempts.len(), 4);

        let gaps: Vec<u128> = attempts
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).as_millis())
            .collect();
        for (gap, expected) in gaps.iter().zip([100u128, 200, 400]) {
            assert!(*gap >= expected && *gap <= expected + 2, "gap {}ms", gap);
        }

        match result {
            Err(WorkflowError::StepFailed {
                step,
                attempts,
                message,
                ..
            }) => {
                assert_eq!(step, "flaky");
                assert_eq!(attempts, 4);
                assert_eq!(message, "still broken");
            }
            other => panic!("expected StepFailed, got {:?}", other.map(|_| ())),
        }

        let step = exec.step("flaky").await.unwrap();
        assert_eq!(step.status, StepStatus::Failed);
        assert_eq!(step.retry_count, 3);
        assert_eq!(step.error.unwrap().message, "still broken");
        assert!(step.output.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_succeed() {
        let exec = executor(Arc::new(MemoryPersistence::new()));
        let calls = AtomicU32::new(0);

        let value: String = exec
            .run(
                "eventually",
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err::<String, BoxError>(format!("attempt {}", n).into())
                        } else {
                            Ok("ok".to_string())
                        }
                    }
                },
                &StepOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(value, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let step = exec.step("eventually").await.unwrap();
        assert_eq!(step.status, StepStatus::Completed);
        assert_eq!(step.retry_count, 2);
        assert!(step.error.is_none());
    }

    #[test]
    fn test_delay_exponential() {
        let options = StepOptions::default().with_retry_delay(100);
        assert_eq!(options.delay_for(0), Duration::from_millis(100));
        assert_eq!(options.delay_for(1), Duration::from_millis(200));
        assert_eq!(options.delay_for(2), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_capped() {
        let options = StepOptions::default()
            .with_retry_delay(1_000)
            .with_max_retry_delay(5_000);
        assert_eq!(options.delay_for(2), Duration::from_millis(4_000));
        assert_eq!(options.delay_for(3), Duration::from_millis(5_000));
        assert_eq!(options.delay_for(80), Duration::from_millis(5_000));
    }

    #[test]
    fn test_delay_fixed() {
        let options = StepOptions::default()
            .with_retry_delay(250)
            .with_exponential_backoff(false);
        assert_eq!(options.delay_for(0), Duration::from_millis(250));
        assert_eq!(options.delay_for(5), Duration::from_millis(250));
    }

    #[test]
    fn test_step_options_defaults() {
        let options = StepOptions::default();
        assert_eq!(options.retries, 3);
        assert_eq!(options.retry_delay, 1_000);
        assert!(options.exponential_backoff);
        assert_eq!(options.max_retry_delay, 60_000);
    }

    #[tokio::test]
    async fn test_platform_steps() {
        let platform = EchoPlatform::default();
        let exec = StepExecutor::new(
            slot_with(WorkflowConfig::default()),
            Arc::new(platform.clone()),
            Arc::new(MemoryPersistence::new()),
            StepOptions::default(),
        );

        let q = exec
            .run_query_step("q", "users:get", json!({"id": 1}), &fast())
            .await
            .unwrap();
        let m = exec
            .run_mutation_step("m", "users:update", json!({}), &fast())
            .await
            .unwrap();
        let a = exec
            .run_action_step("a", "email:send", json!({}), &fast())
            .await
            .unwrap();

        assert_eq!(q["kind"], "query");
        assert_eq!(q["args"]["id"], 1);
        assert_eq!(m["kind"], "mutation");
        assert_eq!(a["reference"], "email:send");

        // cached on replay
        exec.run_query_step("q", "users:get", json!({"id": 1}), &fast())
            .await
            .unwrap();
        assert_eq!(platform.calls.lock().await.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_and_replay() {
        let exec = executor(Arc::new(MemoryPersistence::new()));

        let before = Instant::now();
        exec.sleep("nap", "5s").await.unwrap();
        let slept = before.elapsed().as_millis();
        assert!((5_000..=5_002).contains(&slept));

        let step = exec.step("nap").await.unwrap();
        assert_eq!(step.status, StepStatus::Completed);
        assert_eq!(step.input, Some(json!(5_000)));

        let again = Instant::now();
        exec.sleep("nap", "5s").await.unwrap();
        assert_eq!(again.elapsed().as_millis(), 0);
    }

    #[tokio::test]
    async fn test_sleep_rejects_bad_duration() {
        let exec = executor(Arc::new(MemoryPersistence::new()));
        let err = exec.sleep("nap", "forever").await.unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidDuration(_)));
        assert!(exec.step("nap").await.is_none());
    }

    #[tokio::test]
    async fn test_wait_for_event_suspends_then_replays() {
        let slot = slot_with(WorkflowConfig::default());
        let exec = StepExecutor::new(
            Arc::clone(&slot),
            Arc::new(EchoPlatform::default()),
            Arc::new(MemoryPersistence::new()),
            StepOptions::default(),
        );

        let flow = exec
            .wait_for_event("approval", WaitOptions::default().with_timeout("1d"))
            .await
            .unwrap();
        assert!(flow.is_suspend());

        let step = exec.step("approval").await.unwrap();
        assert_eq!(step.status, StepStatus::Running);
        assert_eq!(step.input, Some(json!({"timeout": "1d"})));
        assert!(step.is_waiting());

        slot.update(|rec| {
            rec.step_entry("approval")
                .complete(json!({"type": "approved", "payload": {"x": 1}}))
        })
        .await;

        let flow = exec
            .wait_for_event("approval", WaitOptions::default())
            .await
            .unwrap();
        assert_eq!(
            flow,
            Flow::Continue(EventPayload::new("approved", json!({"x": 1})))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_preserves_input_order() {
        let exec = executor(Arc::new(MemoryPersistence::new()));

        let delayed = |value: u32, ms: u64| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok::<_, BoxError>(value)
        };

        let results = exec
            .parallel("fan", vec![delayed(1, 300), delayed(2, 100), delayed(3, 200)])
            .await
            .unwrap();

        assert_eq!(results, vec![1, 2, 3]);
        let step = exec.step("fan").await.unwrap();
        assert_eq!(step.output, Some(json!([1, 2, 3])));
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_failure_waits_for_siblings() {
        let exec = executor(Arc::new(MemoryPersistence::new()));
        let sibling_done = AtomicBool::new(false);

        let f1 = async { Ok::<u32, BoxError>(1) }.boxed_local();
        let f2 = async { Err::<u32, BoxError>("f2 exploded".into()) }.boxed_local();
        let f3 = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            sibling_done.store(true, Ordering::SeqCst);
            Ok::<u32, BoxError>(3)
        }
        .boxed_local();

        let err = exec.parallel("fan", vec![f1, f2, f3]).await.unwrap_err();

        assert!(err.to_string().contains("f2 exploded"));
        assert!(sibling_done.load(Ordering::SeqCst));

        let step = exec.step("fan").await.unwrap();
        assert_eq!(step.status, StepStatus::Failed);
        assert_eq!(step.error.unwrap().message, "f2 exploded");
    }

    #[tokio::test]
    async fn test_persistence_failure_propagates() {
        let exec = executor(Arc::new(FlakyPersistence::failing()));
        let calls = AtomicU32::new(0);

        let err = exec
            .run(
                "a",
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, BoxError>(1) }
                },
                &fast(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Persistence { .. }));
        assert!(err.to_string().contains("snapshot store unavailable"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_persist_disabled_skips_saves() {
        let store = MemoryPersistence::new();
        let exec = StepExecutor::new(
            slot_with(WorkflowConfig::default().with_persist(false)),
            Arc::new(EchoPlatform::default()),
            Arc::new(store.clone()),
            StepOptions::default(),
        );

        exec.run("a", || async { Ok::<_, BoxError>(1) }, &fast())
            .await
            .unwrap();
        assert_eq!(store.save_count().await, 0);
    }

    #[test]
    fn test_event_payload_wire_shape() {
        let event = EventPayload::new("approved", json!({"x": 1}));
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "approved", "payload": {"x": 1}})
        );
    }
}
