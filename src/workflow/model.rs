//! Execution Data Model
//!
//! The persisted state of a workflow run and its step history.
//!
//! # Example JSON Snapshot
//!
//! ```json
//! {
//!   "id": "5b0a1c2e-...",
//!   "name": "order_fulfillment",
//!   "status": "running",
//!   "args": { "orderId": 42 },
//!   "steps": [
//!     { "name": "reserve", "status": "completed", "output": { "ok": true }, "retryCount": 0 },
//!     { "name": "approval", "status": "running", "input": { "timeout": "1d" }, "retryCount": 0 }
//!   ],
//!   "startTime": "2026-01-01T00:00:00Z",
//!   "retryCount": 0,
//!   "maxRetries": 3,
//!   "timeout": 3600000
//! }
//! ```

use std::collections::HashMap;
use std::error::Error;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::render_source_chain;

/// Lifecycle status of a workflow execution.
///
/// `Pending -> Running -> {Completed, Failed, Cancelled, TimedOut}`. A
/// suspended execution stays `Running` until a signal resumes it.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

impl WorkflowStatus {
    /// Returns true once the execution can no longer make progress.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }

    /// Returns the wire name of this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timed_out",
        }
    }

    /// Parses a wire name back into a status.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            "timed_out" => Some(Self::TimedOut),
            _ => None,
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a single step.
///
/// `Retrying` and `Cancelled` are part of the vocabulary but the executor
/// never records them: a retrying step stays `Running`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Retrying,
    Cancelled,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Retrying => "retrying",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Captured failure details.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorInfo {
    pub message: String,

    /// Rendered cause chain, when the error had underlying sources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorInfo {
    /// Creates error details with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    /// Captures the message and cause chain of an error.
    pub fn from_error(err: &(dyn Error + 'static)) -> Self {
        Self {
            message: err.to_string(),
            stack: render_source_chain(err),
        }
    }
}

/// One step of a workflow execution.
///
/// The step name is the memoization key: once a step is `Completed`, its
/// `output` is replayed instead of re-running the step body.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepExecution {
    pub name: String,

    pub status: StepStatus,

    /// Metadata recorded when the step started (sleep duration, wait options)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,

    /// Cached result, present once the step completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub retry_count: u32,
}

impl StepExecution {
    /// Creates a step record that has not started yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Pending,
            input: None,
            output: None,
            error: None,
            start_time: None,
            end_time: None,
            retry_count: 0,
        }
    }

    /// Returns true if this step finished successfully.
    pub fn is_completed(&self) -> bool {
        self.status == StepStatus::Completed
    }

    /// Returns true if this step is running with object-shaped input,
    /// which is how event waits are recorded.
    pub fn is_waiting(&self) -> bool {
        self.status == StepStatus::Running && matches!(self.input, Some(Value::Object(_)))
    }

    /// Marks the step running, optionally recording new input metadata.
    pub fn begin(&mut self, input: Option<Value>) {
        self.status = StepStatus::Running;
        self.start_time = Some(Utc::now());
        self.end_time = None;
        self.output = None;
        self.error = None;
        if input.is_some() {
            self.input = input;
        }
    }

    /// Marks the step completed with its output.
    pub fn complete(&mut self, output: Value) {
        self.status = StepStatus::Completed;
        self.output = Some(output);
        self.error = None;
        self.end_time = Some(Utc::now());
    }

    /// Marks the step failed.
    pub fn fail(&mut self, error: ErrorInfo) {
        self.status = StepStatus::Failed;
        self.output = None;
        self.error = Some(error);
        self.end_time = Some(Utc::now());
    }

    /// Step duration in milliseconds, if it has both timestamps.
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

/// One run of a workflow definition.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecution {
    pub id: String,

    /// Name of the definition this execution runs
    pub name: String,

    pub status: WorkflowStatus,

    #[serde(default)]
    pub args: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,

    /// Step history in first-reference order
    #[serde(default)]
    pub steps: Vec<StepExecution>,

    pub start_time: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub retry_count: u32,

    pub max_retries: u32,

    /// Workflow timeout in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Step name -> position in `steps`
    #[serde(skip)]
    step_index: HashMap<String, usize>,
}

impl PartialEq for WorkflowExecution {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.status == other.status
            && self.args == other.args
            && self.result == other.result
            && self.error == other.error
            && self.steps == other.steps
            && self.start_time == other.start_time
            && self.end_time == other.end_time
            && self.retry_count == other.retry_count
            && self.max_retries == other.max_retries
            && self.timeout == other.timeout
    }
}

impl WorkflowExecution {
    /// Creates a pending execution.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        args: Value,
        max_retries: u32,
        timeout: Option<u64>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: WorkflowStatus::Pending,
            args,
            result: None,
            error: None,
            steps: Vec::new(),
            start_time: Utc::now(),
            end_time: None,
            retry_count: 0,
            max_retries,
            timeout,
            step_index: HashMap::new(),
        }
    }

    /// Rebuilds the step name index from `steps`.
    ///
    /// Lookups rebuild a stale index on their own; this only saves the
    /// first lookup after loading a snapshot from doing it.
    pub fn reindex(&mut self) {
        self.step_index = self
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| (step.name.clone(), i))
            .collect();
    }

    /// Position of a step, falling back to a scan when the index is stale.
    fn position(&self, name: &str) -> Option<usize> {
        match self.step_index.get(name) {
            Some(&i) if matches!(self.steps.get(i), Some(step) if step.name == name) => Some(i),
            _ => self.steps.iter().position(|step| step.name == name),
        }
    }

    /// Gets a step by name.
    pub fn step(&self, name: &str) -> Option<&StepExecution> {
        self.position(name).map(|i| &self.steps[i])
    }

    /// Gets a step by name, appending a new pending record if absent.
    pub fn step_entry(&mut self, name: &str) -> &mut StepExecution {
        if self.step_index.len() != self.steps.len() {
            self.reindex();
        }

        let index = match self.position(name) {
            Some(i) => i,
            None => {
                self.steps.push(StepExecution::new(name));
                let i = self.steps.len() - 1;
                self.step_index.insert(name.to_string(), i);
                i
            }
        };
        &mut self.steps[index]
    }

    /// Returns the cached output of a completed step.
    pub fn completed_output(&self, name: &str) -> Option<Value> {
        self.step(name)
            .filter(|step| step.is_completed())
            .map(|step| step.output.clone().unwrap_or(Value::Null))
    }

    /// Returns the first step waiting for an event, if any.
    pub fn first_waiting_step(&self) -> Option<&StepExecution> {
        self.steps.iter().find(|step| step.is_waiting())
    }

    /// Moves the execution into a terminal status and stamps the end time.
    pub fn finish(&mut self, status: WorkflowStatus) {
        self.status = status;
        self.end_time = Some(Utc::now());
    }

    /// Returns the number of steps recorded so far.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if no step has been recorded.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
