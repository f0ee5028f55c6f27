//! Live progress snapshots for a run.

use std::sync::{Arc, Mutex, PoisonError};

use scout_core::{Activity, NormalizedTask, RunId, TaskId, TaskStatus};
use serde::Serialize;
use tracing::trace;

use crate::recorder::TaskObserver;

/// Transient view of one task while a run is in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskProgress {
    pub task_id: TaskId,
    pub prompt: String,
    pub status: TaskStatus,
    pub latest_activity: Option<String>,
    pub activity_count: usize,
}

/// Full snapshot emitted after every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub run_id: RunId,
    /// Rendered progress block.
    pub text: String,
    pub tasks: Vec<TaskProgress>,
    /// Tasks in a terminal status.
    pub finished: usize,
    pub total: usize,
}

/// Progress sink supplied by the caller.
pub type ProgressCallback = Arc<dyn Fn(&ProgressUpdate) + Send + Sync>;

/// Render the progress block shown to the coordinator.
///
/// The header's completed count includes failed tasks: it counts every task
/// that reached a terminal status.
pub fn render_progress(run_id: &RunId, tasks: &[TaskProgress]) -> String {
    let finished = tasks.iter().filter(|t| t.status.is_terminal()).count();
    let mut text = format!("Run {}: {}/{} completed", run_id, finished, tasks.len());
    for task in tasks {
        let latest = task.latest_activity.as_deref().unwrap_or("waiting");
        text.push_str(&format!("\n[{}] {}: {}", task.status, task.task_id, latest));
    }
    text
}

/// Tracks task states for one run and pushes a snapshot to the sink on every
/// activity and status transition.
///
/// The snapshot is built under the lock and emitted after releasing it, on
/// the task that caused the change.
pub struct ProgressTracker {
    run_id: RunId,
    tasks: Mutex<Vec<TaskProgress>>,
    sink: Option<ProgressCallback>,
}

impl ProgressTracker {
    /// Start tracking `tasks`, all queued.
    pub fn new(run_id: RunId, tasks: &[NormalizedTask], sink: Option<ProgressCallback>) -> Self {
        let tasks = tasks
            .iter()
            .map(|task| TaskProgress {
                task_id: task.id.clone(),
                prompt: task.prompt.clone(),
                status: TaskStatus::Queued,
                latest_activity: None,
                activity_count: 0,
            })
            .collect();
        Self {
            run_id,
            tasks: Mutex::new(tasks),
            sink,
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn set_status(&self, task_id: &TaskId, status: TaskStatus) {
        let changed = self.update(task_id, |task| {
            let changed = task.status != status;
            task.status = status;
            changed
        });
        if changed {
            self.publish();
        }
    }

    pub fn snapshot(&self) -> Vec<TaskProgress> {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Emit the current snapshot. Does nothing without a sink.
    pub fn publish(&self) {
        let Some(sink) = &self.sink else {
            return;
        };
        let tasks = self.snapshot();
        let update = ProgressUpdate {
            run_id: self.run_id.clone(),
            text: render_progress(&self.run_id, &tasks),
            finished: tasks.iter().filter(|t| t.status.is_terminal()).count(),
            total: tasks.len(),
            tasks,
        };
        trace!(run_id = %self.run_id, finished = update.finished, "Publishing progress");
        sink(&update);
    }

    fn update(&self, task_id: &TaskId, apply: impl FnOnce(&mut TaskProgress) -> bool) -> bool {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        match tasks.iter_mut().find(|t| &t.task_id == task_id) {
            Some(task) => apply(task),
            None => false,
        }
    }
}

impl TaskObserver for ProgressTracker {
    fn on_activity(&self, task_id: &TaskId, activity: &Activity, total: usize) {
        let changed = self.update(task_id, |task| {
            task.latest_activity = Some(activity.summary());
            task.activity_count = total;
            true
        });
        if changed {
            self.publish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scout_core::ActivityKind;

    fn tasks() -> Vec<NormalizedTask> {
        ["alpha", "beta"]
            .iter()
            .map(|id| NormalizedTask {
                id: TaskId::new(*id),
                prompt: format!("look into {}", id),
                work_dir: None,
            })
            .collect()
    }

    fn collecting() -> (ProgressCallback, Arc<Mutex<Vec<ProgressUpdate>>>) {
        let updates = Arc::new(Mutex::new(Vec::new()));
        let sink_updates = updates.clone();
        let sink: ProgressCallback = Arc::new(move |update: &ProgressUpdate| {
            sink_updates.lock().unwrap().push(update.clone());
        });
        (sink, updates)
    }

    #[test]
    fn test_render_progress() {
        let tracker = ProgressTracker::new(RunId::new("run-1"), &tasks(), None);
        tracker.set_status(&TaskId::new("alpha"), TaskStatus::Completed);
        assert_eq!(
            render_progress(tracker.run_id(), &tracker.snapshot()),
            "Run run-1: 1/2 completed\n[completed] alpha: waiting\n[queued] beta: waiting"
        );
    }

    #[test]
    fn test_emits_on_activity_and_status_change() {
        let (sink, updates) = collecting();
        let tracker = ProgressTracker::new(RunId::new("run-1"), &tasks(), Some(sink));

        tracker.set_status(&TaskId::new("alpha"), TaskStatus::Running);
        tracker.set_status(&TaskId::new("alpha"), TaskStatus::Running);
        tracker.on_activity(
            &TaskId::new("alpha"),
            &Activity::new(ActivityKind::Tool, "web_search"),
            7,
        );
        tracker.on_activity(
            &TaskId::new("nobody"),
            &Activity::new(ActivityKind::Tool, "ignored"),
            1,
        );
        tracker.set_status(&TaskId::new("alpha"), TaskStatus::Failed);

        let updates = updates.lock().unwrap();
        assert_eq!(updates.len(), 3);

        let latest = &updates[1].tasks[0];
        assert_eq!(latest.latest_activity.as_deref(), Some("tool: web_search"));
        assert_eq!(latest.activity_count, 7);
        assert!(updates[1].text.contains("[running] alpha: tool: web_search"));

        assert_eq!(updates[2].finished, 1);
        assert_eq!(updates[2].total, 2);
        assert!(updates[2].text.starts_with("Run run-1: 1/2 completed\n[failed] alpha"));
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let tracker = ProgressTracker::new(RunId::new("run-1"), &tasks(), None);
        let json = serde_json::to_value(tracker.snapshot()).unwrap();
        assert_eq!(json[0]["taskId"], "alpha");
        assert_eq!(json[0]["status"], "queued");
        assert_eq!(json[0]["activityCount"], 0);
        assert!(json[0]["latestActivity"].is_null());
    }
}
