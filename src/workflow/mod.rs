//! Workflow Definition Module
//!
//! Data structures for defining workflows and recording their executions.
//!
//! # Structure
//!
//! - [`model`]: Execution and step records (WorkflowExecution, StepExecution)
//! - [`definition`]: Workflow definitions and handler types
//! - [`duration`]: Human-readable duration parsing
//! - [`ids`]: Execution id generation
//! - [`state`]: File-backed execution snapshots

pub mod definition;
pub mod duration;
pub mod ids;
pub mod model;
pub mod state;

pub use definition::{define_workflow, Handler, HandlerResult, WorkflowConfig, WorkflowDefinition};
pub use duration::{parse_duration, DurationSpec};
pub use ids::generate_execution_id;
pub use model::{ErrorInfo, StepExecution, StepStatus, WorkflowExecution, WorkflowStatus};
pub use state::FileSnapshotStore;
