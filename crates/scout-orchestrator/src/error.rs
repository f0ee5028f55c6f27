//! Caller-facing orchestrator errors.

use std::fmt::Display;

use scout_core::{RunId, TaskId};
use thiserror::Error;

/// Errors reported straight back to the caller. Worker failures are not
/// errors; they become failed task results.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Concurrency outside `1..=max` or not a whole number.
    #[error("Invalid concurrency {value}: expected a whole number between 1 and {max}")]
    InvalidConcurrency { value: String, max: usize },

    /// Steer request for a run the registry does not hold.
    #[error("Unknown run id '{run_id}'. Known run ids: {}", join_ids(.known))]
    RunNotFound { run_id: RunId, known: Vec<RunId> },

    /// Steer request for a task the run does not contain.
    #[error("Unknown task id '{task_id}' in run '{run_id}'. Known task ids: {}", join_ids(.known))]
    TaskNotFound {
        run_id: RunId,
        task_id: TaskId,
        known: Vec<TaskId>,
    },
}

fn join_ids<T: Display>(ids: &[T]) -> String {
    if ids.is_empty() {
        return "(none)".to_string();
    }
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
