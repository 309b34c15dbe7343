//! Execution Monitoring Module
//!
//! Timing reports derived from execution records.
//!
//! # Components
//!
//! - [`ExecutionTimeline`]: Step start/end timing for Gantt charts

pub mod timeline;

pub use timeline::{EventType, ExecutionTimeline, TimelineEvent};
