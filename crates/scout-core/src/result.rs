//! Results of finished tasks and the run records that group them.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Activity, RunId, TaskId};

/// Error text recorded for a task whose worker was cancelled.
pub const ABORTED_MARKER: &str = "aborted";

/// Outcome of one worker invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub task_id: TaskId,

    /// The task prompt as supplied (not the composed worker prompt).
    pub prompt: String,

    /// Directory the worker ran in.
    pub work_dir: String,

    /// Last assistant text block the worker produced.
    pub output: String,

    /// URLs found in `output`, deduplicated in first-seen order.
    pub references: Vec<String>,

    pub exit_code: i32,

    /// Captured stderr, or [`ABORTED_MARKER`] when the worker was cancelled.
    pub stderr: String,

    /// Most recent activities, oldest first.
    pub activities: Vec<Activity>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Instructions accumulated across steer invocations, oldest first.
    #[serde(default)]
    pub steering_notes: Vec<String>,
}

impl TaskResult {
    /// Exit code 0 is success; anything else, including an abort, is failure.
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn is_aborted(&self) -> bool {
        self.stderr == ABORTED_MARKER
    }

    /// Wall-clock time between start and finish.
    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or_default()
    }
}

/// A completed batch, kept by the registry so its tasks can be steered later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_id: RunId,
    pub created_at: DateTime<Utc>,
    pub tasks: Vec<TaskResult>,
}

impl RunRecord {
    /// Create a record stamped with the current time.
    pub fn new(run_id: RunId, tasks: Vec<TaskResult>) -> Self {
        Self {
            run_id,
            created_at: Utc::now(),
            tasks,
        }
    }

    /// Position of a task within the run.
    pub fn task_index(&self, task_id: &TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| &t.task_id == task_id)
    }

    pub fn task_ids(&self) -> Vec<TaskId> {
        self.tasks.iter().map(|t| t.task_id.clone()).collect()
    }
}

/// Caller-facing view of a run with success counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunDetails {
    pub run_id: RunId,
    pub tasks: Vec<TaskResult>,
    pub success_count: usize,
    pub total_count: usize,
}

impl RunDetails {
    pub fn build(run_id: RunId, tasks: Vec<TaskResult>) -> Self {
        let success_count = tasks.iter().filter(|t| t.is_success()).count();
        let total_count = tasks.len();
        Self {
            run_id,
            tasks,
            success_count,
            total_count,
        }
    }
}

impl From<&RunRecord> for RunDetails {
    fn from(record: &RunRecord) -> Self {
        Self::build(record.run_id.clone(), record.tasks.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, exit_code: i32, stderr: &str) -> TaskResult {
        let started_at = Utc::now();
        TaskResult {
            task_id: TaskId::new(id),
            prompt: "p".to_string(),
            work_dir: "/tmp".to_string(),
            output: String::new(),
            references: Vec::new(),
            exit_code,
            stderr: stderr.to_string(),
            activities: Vec::new(),
            started_at,
            finished_at: started_at + chrono::Duration::milliseconds(1500),
            steering_notes: Vec::new(),
        }
    }

    #[test]
    fn test_run_details_counts() {
        let details = RunDetails::build(
            RunId::new("run-1"),
            vec![result("a", 0, ""), result("b", 1, "failed")],
        );
        assert_eq!(details.success_count, 1);
        assert_eq!(details.total_count, 2);
    }

    #[test]
    fn test_aborted_is_failure() {
        let aborted = result("a", 143, ABORTED_MARKER);
        assert!(aborted.is_aborted());
        assert!(!aborted.is_success());
    }

    #[test]
    fn test_duration_and_lookup() {
        let record = RunRecord::new(RunId::new("run-1"), vec![result("a", 0, ""), result("b", 0, "")]);
        assert_eq!(record.tasks[0].duration(), Duration::from_millis(1500));
        assert_eq!(record.task_index(&TaskId::new("b")), Some(1));
        assert_eq!(record.task_index(&TaskId::new("zzz")), None);
        assert_eq!(record.task_ids(), vec![TaskId::new("a"), TaskId::new("b")]);
    }

    #[test]
    fn test_details_serialize_camel_case() {
        let details = RunDetails::from(&RunRecord::new(RunId::new("run-1"), vec![result("a", 0, "")]));
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["successCount"], 1);
        assert_eq!(json["tasks"][0]["taskId"], "a");
        assert_eq!(json["tasks"][0]["exitCode"], 0);
    }
}
