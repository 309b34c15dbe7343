//! steprunner - Durable Step Execution Engine
//!
//! Runs long-lived workflows made of named, memoized steps. Completed steps
//! are cached on the execution record, so a workflow that is resumed (by an
//! event signal or after a restart) replays finished work from the cache and
//! picks up where it stopped.
//!
//! # Architecture
//!
//! The library is organized into four main modules:
//!
//! - [`workflow`]: Definitions, execution records, durations and snapshot files
//! - [`execution`]: Manager, step executor and handler context
//! - [`monitoring`]: Execution timeline reports
//! - [`config`]: Engine defaults loaded from YAML
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::{json, Value};
//! use steprunner::execution::{NoPlatform, StartOptions, WaitOptions, WorkflowCtx, WorkflowManager};
//! use steprunner::workflow::{define_workflow, FileSnapshotStore, HandlerResult, WorkflowConfig};
//! use steprunner::proceed;
//!
//! async fn onboarding(ctx: WorkflowCtx, args: Value) -> HandlerResult {
//!     let account: Value = ctx
//!         .run("create-account", || async { Ok::<_, steprunner::BoxError>(json!({"id": 7})) })
//!         .await?;
//!     ctx.sleep("cool-off", "10s").await?;
//!
//!     // Parks the execution until someone calls `signal`
//!     let approval = proceed!(ctx.wait_for_event("approval", WaitOptions::default()).await?);
//!
//!     Ok(json!({ "account": account, "approvedBy": approval.payload, "args": args }).into())
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = FileSnapshotStore::new(".steprunner");
//!     let manager = WorkflowManager::new(Arc::new(NoPlatform), Arc::new(store));
//!
//!     let definition = define_workflow("onboarding", WorkflowConfig::default(), onboarding);
//!     manager.register(definition.clone()).await;
//!
//!     let handle = manager.start(&definition, json!({"email": "a@b.c"}), StartOptions::default()).await?;
//!
//!     // Signals only land once the handler is parked on its wait
//!     while handle.execution().await?.first_waiting_step().is_none() {
//!         tokio::time::sleep(std::time::Duration::from_millis(200)).await;
//!     }
//!     handle.signal("approval", json!("ops")).await?;
//!     println!("{}", handle.result().await?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod execution;
pub mod monitoring;
pub mod workflow;

// Re-export commonly used types
pub use config::{load_config, EngineConfig};
pub use error::{BoxError, Result, WorkflowError};
pub use execution::{Flow, StartOptions, WorkflowCtx, WorkflowHandle, WorkflowManager};
pub use workflow::{define_workflow, WorkflowConfig, WorkflowDefinition, WorkflowExecution, WorkflowStatus};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "steprunner";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_version() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_app_name() {
        assert_eq!(APP_NAME, "steprunner");
    }

    #[test]
    fn test_module_exports_config() {
        let config = EngineConfig::default();
        assert_eq!(config.default_max_retries, 3);
    }

    #[test]
    fn test_module_exports_status() {
        assert!(WorkflowStatus::Completed.is_terminal());
        assert!(!WorkflowStatus::Running.is_terminal());
    }

    #[test]
    fn test_version_format() {
        let parts: Vec<&str> = VERSION.split('.').collect();
        assert!(parts.len() >= 2, "Version should have at least major.minor");
        for part in parts {
            assert!(part.parse::<u32>().is_ok(), "Version components should be numeric");
        }
    }
}
