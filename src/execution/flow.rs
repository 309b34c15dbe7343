//! Step Outcomes
//!
//! Operations that may park an execution (currently
//! [`wait_for_event`](super::WorkflowCtx::wait_for_event)) return a [`Flow`]
//! instead of a bare value. A handler that receives [`Flow::Suspend`] must
//! return it, which the manager reads as "leave the execution running until a
//! signal arrives".

/// Outcome of a step that may suspend the workflow.
#[must_use = "a suspended flow must be returned from the handler"]
#[derive(Debug, Clone, PartialEq)]
pub enum Flow<T> {
    /// The step produced a value; keep going.
    Continue(T),
    /// The step is waiting on something external; stop this pass.
    Suspend,
}

impl<T> Flow<T> {
    /// Returns true if this is a suspension.
    pub fn is_suspend(&self) -> bool {
        matches!(self, Self::Suspend)
    }

    /// Maps the continued value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Flow<U> {
        match self {
            Self::Continue(value) => Flow::Continue(f(value)),
            Self::Suspend => Flow::Suspend,
        }
    }

    /// Converts into an `Option`, discarding the suspension.
    pub fn continued(self) -> Option<T> {
        match self {
            Self::Continue(value) => Some(value),
            Self::Suspend => None,
        }
    }
}

impl<T> From<T> for Flow<T> {
    fn from(value: T) -> Self {
        Self::Continue(value)
    }
}

/// Unwraps a [`Flow::Continue`] value, or returns `Ok(Flow::Suspend)` from
/// the enclosing handler.
///
/// ```rust,ignore
/// let approval = proceed!(ctx.wait_for_event("approval", WaitOptions::default()).await?);
/// ```
#[macro_export]
macro_rules! proceed {
    ($flow:expr) => {
        match $flow {
            $crate::execution::Flow::Continue(value) => value,
            $crate::execution::Flow::Suspend => {
                return ::std::result::Result::Ok($crate::execution::Flow::Suspend)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(flow: Flow<u32>) -> Result<Flow<u32>, String> {
        let value = proceed!(flow);
        Ok(Flow::Continue(value * 2))
    }

    #[test]
    fn test_proceed_unwraps_continue() {
        assert_eq!(gate(Flow::Continue(21)), Ok(Flow::Continue(42)));
    }

    #[test]
    fn test_proceed_returns_suspend() {
        assert_eq!(gate(Flow::Suspend), Ok(Flow::Suspend));
    }

    #[test]
    fn test_flow_helpers() {
        let flow: Flow<u32> = 5.into();
        assert!(!flow.is_suspend());
        assert_eq!(flow.clone().map(|v| v + 1), Flow::Continue(6));
        assert_eq!(flow.continued(), Some(5));
        assert_eq!(Flow::<u32>::Suspend.continued(), None);
    }
}
