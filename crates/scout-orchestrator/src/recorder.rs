//! Per-task activity recording with a hook for live observers.

use std::sync::{Arc, Mutex, PoisonError};

use scout_core::{truncate_preview, Activity, ActivityKind, ActivityLog, TaskId};

/// Receives every activity as it is recorded.
///
/// Called synchronously from the task that supervises the worker, so
/// implementations must return quickly.
pub trait TaskObserver: Send + Sync {
    /// `total` counts every activity recorded for the task so far, including
    /// ones the ring buffer has since dropped.
    fn on_activity(&self, task_id: &TaskId, activity: &Activity, total: usize);
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TaskObserver for NoopObserver {
    fn on_activity(&self, _task_id: &TaskId, _activity: &Activity, _total: usize) {}
}

struct RecorderState {
    log: ActivityLog,
    total: usize,
}

/// Bounded activity trail for one task.
pub struct ActivityRecorder {
    task_id: TaskId,
    preview_chars: usize,
    state: Mutex<RecorderState>,
    observer: Arc<dyn TaskObserver>,
}

impl ActivityRecorder {
    pub fn new(
        task_id: TaskId,
        capacity: usize,
        preview_chars: usize,
        observer: Arc<dyn TaskObserver>,
    ) -> Self {
        Self {
            task_id,
            preview_chars,
            state: Mutex::new(RecorderState {
                log: ActivityLog::new(capacity),
                total: 0,
            }),
            observer,
        }
    }

    /// Record a line, truncated to the preview length, and notify the observer.
    pub fn record(&self, kind: ActivityKind, text: &str) {
        let activity = Activity::new(kind, truncate_preview(text, self.preview_chars));
        let total = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.log.push(activity.clone());
            state.total += 1;
            state.total
        };
        self.observer.on_activity(&self.task_id, &activity, total);
    }

    /// Retained activities, oldest first.
    pub fn activities(&self) -> Vec<Activity> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .log
            .to_vec()
    }

    pub fn total(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).total
    }
}
