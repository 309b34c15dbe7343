//! Caller-facing handle to one execution.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::engine::WorkflowManager;
use crate::error::{Result, WorkflowError};
use crate::workflow::{WorkflowExecution, WorkflowStatus};

/// Handle returned by [`WorkflowManager::start`].
#[derive(Clone)]
pub struct WorkflowHandle {
    id: String,
    manager: WorkflowManager,
}

impl WorkflowHandle {
    pub(crate) fn new(id: impl Into<String>, manager: WorkflowManager) -> Self {
        Self {
            id: id.into(),
            manager,
        }
    }

    /// Execution id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Waits for the execution to reach a terminal status.
    ///
    /// Returns the result for completed executions. Failed, timed-out and
    /// cancelled executions return [`WorkflowError::Failed`],
    /// [`WorkflowError::Timeout`] and [`WorkflowError::Cancelled`]. Fails
    /// with `NotFound` if the execution is removed while waiting.
    pub async fn result(&self) -> Result<Value> {
        let mut status = self.manager.subscribe(&self.id).await?;

        loop {
            let current = *status.borrow_and_update();
            if current.is_terminal() {
                break;
            }
            if status.changed().await.is_err() || !self.manager.contains(&self.id).await {
                return Err(WorkflowError::NotFound(self.id.clone()));
            }
        }

        let execution = self.execution().await?;
        outcome(execution)
    }

    /// Waits for the result and deserializes it.
    pub async fn result_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.result().await?)?)
    }

    /// Current status.
    pub async fn status(&self) -> Result<WorkflowStatus> {
        self.manager.status(&self.id).await
    }

    /// Snapshot of the execution record.
    pub async fn execution(&self) -> Result<WorkflowExecution> {
        self.manager
            .get_execution(&self.id)
            .await
            .ok_or_else(|| WorkflowError::NotFound(self.id.clone()))
    }

    /// Cancels the execution.
    pub async fn cancel(&self, reason: Option<&str>) -> Result<()> {
        self.manager.cancel(&self.id, reason).await
    }

    /// Delivers an event to the step waiting for one.
    pub async fn signal(&self, event_type: &str, payload: Value) -> Result<()> {
        self.manager.signal(&self.id, event_type, payload).await
    }
}

/// Converts a terminal execution into what `result()` reports.
fn outcome(execution: WorkflowExecution) -> Result<Value> {
    let WorkflowExecution {
        id,
        status,
        result,
        error,
        timeout,
        ..
    } = execution;
    let message = error.map(|e| e.message);

    match status {
        WorkflowStatus::Completed => Ok(result.unwrap_or(Value::Null)),
        WorkflowStatus::Failed => Err(WorkflowError::Failed {
            id,
            message: message.unwrap_or_else(|| "Workflow failed".to_string()),
        }),
        WorkflowStatus::TimedOut => Err(WorkflowError::Timeout {
            id,
            timeout_ms: timeout.unwrap_or_default(),
        }),
        WorkflowStatus::Cancelled => Err(WorkflowError::Cancelled {
            id,
            reason: message.unwrap_or_else(|| "Workflow was cancelled".to_string()),
        }),
        WorkflowStatus::Pending | WorkflowStatus::Running => Err(WorkflowError::InvalidState {
            id,
            status,
            operation: "read the result of",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::ErrorInfo;
    use serde_json::json;

    fn finished(status: WorkflowStatus) -> WorkflowExecution {
        let mut execution = WorkflowExecution::new("e1", "demo", json!({}), 3, Some(250));
        execution.finish(status);
        execution
    }

    #[test]
    fn test_completed_outcome() {
        let mut execution = finished(WorkflowStatus::Completed);
        execution.result = Some(json!({"ok": true}));
        assert_eq!(outcome(execution).unwrap(), json!({"ok": true}));
    }

    #[test]
    fn test_failed_outcome_keeps_message() {
        let mut execution = finished(WorkflowStatus::Failed);
        execution.error = Some(ErrorInfo::new("boom"));
        assert_eq!(outcome(execution).unwrap_err().to_string(), "boom");
    }

    #[test]
    fn test_timed_out_outcome() {
        let err = outcome(finished(WorkflowStatus::TimedOut)).unwrap_err();
        assert_eq!(err.to_string(), "Workflow 'e1' timed out after 250ms");
    }

    #[test]
    fn test_cancelled_outcome_default_reason() {
        let err = outcome(finished(WorkflowStatus::Cancelled)).unwrap_err();
        match err {
            WorkflowError::Cancelled { reason, .. } => assert_eq!(reason, "Workflow was cancelled"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_running_has_no_outcome() {
        let mut execution = finished(WorkflowStatus::Completed);
        execution.status = WorkflowStatus::Running;
        assert!(matches!(
            outcome(execution),
            Err(WorkflowError::InvalidState { .. })
        ));
    }
}
