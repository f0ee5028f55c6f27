//! Scout Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Subprocesses
//! - Async runtimes
//! - Terminal rendering
//!
//! Everything the orchestrator stores, reports or hands to a host lives here.

pub mod activity;
pub mod ids;
pub mod result;
pub mod status;
pub mod task;

// Re-export commonly used types
pub use activity::{
    truncate_preview, Activity, ActivityKind, ActivityLog, DEFAULT_ACTIVITY_CAPACITY,
};
pub use ids::{RunId, TaskId};
pub use result::{RunDetails, RunRecord, TaskResult, ABORTED_MARKER};
pub use status::TaskStatus;
pub use task::{normalize_tasks, NormalizedTask, RawTask};
