//! Status of a task while a batch is in flight.

use serde::{Deserialize, Serialize};

/// Live status of a task within a batch or steer invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for a free worker slot.
    #[default]
    Queued,
    /// Worker process is running.
    Running,
    /// Worker exited with code 0.
    Completed,
    /// Worker exited non-zero, failed to start, or was aborted.
    Failed,
}

impl TaskStatus {
    /// Returns true if the task has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Lowercase label used in progress blocks and reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
