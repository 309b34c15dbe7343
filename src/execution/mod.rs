//! Workflow Execution Module
//!
//! Runs workflow handlers and the steps inside them.
//!
//! # Architecture
//!
//! - [`engine`]: Manager orchestrating executions (start, resume, cancel, signal)
//! - [`step`]: Individual step execution, caching and retries
//! - [`context`]: Context handed to handlers
//! - [`handle`]: Caller-facing execution handle
//! - [`store`]: Table of live executions
//! - [`backend`]: Injected platform and persistence collaborators
//! - [`flow`]: Suspension outcome

pub mod backend;
pub mod context;
pub mod engine;
pub mod flow;
pub mod handle;
pub mod step;
pub mod store;

pub use backend::{MemoryPersistence, NoPlatform, Persistence, Platform};
pub use context::WorkflowCtx;
pub use engine::{ExecutionFilter, StartOptions, WorkflowManager};
pub use flow::Flow;
pub use handle::WorkflowHandle;
pub use step::{EventPayload, StepExecutor, StepOptions, WaitOptions};
pub use store::{ExecutionSlot, ExecutionStore};
