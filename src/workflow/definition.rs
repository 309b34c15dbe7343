//! Workflow Definitions
//!
//! A definition pairs a unique name with an async handler and its
//! retry/timeout configuration. Definitions are immutable once built and are
//! cheap to clone (the handler is reference counted).
//!
//! # Example
//!
//! ```rust,no_run
//! use serde_json::{json, Value};
//! use steprunner::execution::WorkflowCtx;
//! use steprunner::workflow::{define_workflow, HandlerResult, WorkflowConfig};
//!
//! async fn greet(ctx: WorkflowCtx, args: Value) -> HandlerResult {
//!     let name: String = ctx
//!         .run("lookup", || async { Ok::<_, steprunner::BoxError>("world".to_string()) })
//!         .await?;
//!     Ok(json!({ "greeting": format!("hello {}", name), "args": args }).into())
//! }
//!
//! let definition = define_workflow("greet", WorkflowConfig::default().with_timeout("5m"), greet);
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::duration::DurationSpec;
use crate::error::BoxError;
use crate::execution::{Flow, WorkflowCtx};

/// What a handler returns: a finished value, a suspension, or an error.
pub type HandlerResult = Result<Flow<Value>, BoxError>;

/// Type-erased workflow handler.
pub type Handler = Arc<dyn Fn(WorkflowCtx, Value) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Per-definition execution settings.
///
/// Unset values fall back to the engine defaults at start time.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WorkflowConfig {
    /// Recorded retry budget for executions of this workflow
    #[serde(default)]
    pub max_retries: Option<u32>,

    /// Workflow-level timeout
    #[serde(default)]
    pub timeout: Option<DurationSpec>,

    /// Whether step transitions are sent to the persistence collaborator
    #[serde(default = "default_persist")]
    pub persist: bool,
}

fn default_persist() -> bool {
    true
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_retries: None,
            timeout: None,
            persist: true,
        }
    }
}

impl WorkflowConfig {
    /// Sets the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Sets the workflow timeout.
    pub fn with_timeout(mut self, timeout: impl Into<DurationSpec>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }

    /// Enables or disables persistence of step transitions.
    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }
}

/// A named workflow: handler plus configuration.
#[derive(Clone)]
pub struct WorkflowDefinition {
    name: String,
    handler: Handler,
    config: WorkflowConfig,
}

impl WorkflowDefinition {
    /// Returns the definition's unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the definition's configuration.
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Invokes the handler, producing the future that drives one pass.
    pub fn invoke(&self, ctx: WorkflowCtx, args: Value) -> BoxFuture<'static, HandlerResult> {
        (self.handler)(ctx, args)
    }
}

impl fmt::Debug for WorkflowDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowDefinition")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builds a workflow definition from an async handler.
pub fn define_workflow<F, Fut>(
    name: impl Into<String>,
    config: WorkflowConfig,
    handler: F,
) -> WorkflowDefinition
where
    F: Fn(WorkflowCtx, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    WorkflowDefinition {
        name: name.into().trim().to_string(),
        handler: Arc::new(move |ctx, args| handler(ctx, args).boxed()),
        config,
    }
}
