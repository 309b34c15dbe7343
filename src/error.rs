//! Engine Error Types
//!
//! A single error enum covers every failure the engine reports: exhausted
//! steps, workflow-level timeouts and cancellations, persistence failures and
//! the lookup/state errors raised by the manager API.
//!
//! Suspension while waiting for an event is *not* an error. It travels as
//! [`Flow::Suspend`](crate::execution::Flow) instead.

use std::error::Error;

use thiserror::Error;

use crate::workflow::WorkflowStatus;

/// Boxed error accepted from step bodies, handlers and collaborators.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Result type used across the engine.
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Errors reported by the workflow engine.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// A step exhausted its retries.
    #[error("Step '{step}' failed after {attempts} attempt(s): {message}")]
    StepFailed {
        step: String,
        attempts: u32,
        message: String,
        #[source]
        source: BoxError,
    },

    /// The handler did not settle within the workflow timeout.
    #[error("Workflow '{id}' timed out after {timeout_ms}ms")]
    Timeout { id: String, timeout_ms: u64 },

    /// The execution was cancelled.
    #[error("Workflow '{id}' was cancelled: {reason}")]
    Cancelled { id: String, reason: String },

    /// The execution finished in the failed state.
    #[error("{message}")]
    Failed { id: String, message: String },

    /// The persistence collaborator rejected a snapshot.
    #[error("Failed to persist execution '{id}': {message}")]
    Persistence {
        id: String,
        message: String,
        #[source]
        source: BoxError,
    },

    /// No execution with this id is known.
    #[error("Execution not found: {0}")]
    NotFound(String),

    /// A caller-supplied execution id is already taken.
    #[error("Execution already exists: {0}")]
    AlreadyExists(String),

    /// No definition registered under this name.
    #[error("Workflow definition not found: {0}")]
    DefinitionNotFound(String),

    /// The requested operation is not legal in the execution's current status.
    #[error("Execution '{id}' is {status}; cannot {operation}")]
    InvalidState {
        id: String,
        status: WorkflowStatus,
        operation: &'static str,
    },

    /// A signal arrived but no step is waiting for it.
    #[error("Execution '{id}' has no step waiting for an event{}", .step.as_ref().map(|s| format!(" named '{}'", s)).unwrap_or_default())]
    NoWaitingStep { id: String, step: Option<String> },

    /// A duration value could not be parsed.
    #[error("Invalid duration: '{0}' (expected milliseconds or a number with ms/s/m/h/d suffix)")]
    InvalidDuration(String),

    /// A step output or result could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Engine configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Snapshot file IO failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkflowError {
    /// Wraps a persistence failure for an execution.
    pub fn persistence(id: impl Into<String>, source: BoxError) -> Self {
        Self::Persistence {
            id: id.into(),
            message: source.to_string(),
            source,
        }
    }
}

/// Renders the `source()` chain of an error, one `caused by:` line per cause.
///
/// Returns `None` when the error has no underlying cause.
pub fn render_source_chain(err: &(dyn Error + 'static)) -> Option<String> {
    let mut lines = Vec::new();
    let mut current = err.source();

    while let Some(cause) = current {
        lines.push(format!("caused by: {}", cause));
        current = cause.source();
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}
