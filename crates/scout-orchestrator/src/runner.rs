//! Runs one task as a worker process and turns its event stream into a
//! [`TaskResult`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use scout_core::{truncate_preview, ActivityKind, NormalizedTask, TaskResult, ABORTED_MARKER};
use scout_worker_sdk::{
    tool_result_text, ContentItem, LifecycleEvent, SdkError, WorkerExecutor, WorkerHandler,
    WorkerMessage,
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::OrchestratorConfig;
use crate::prompt::{compose_prompt, SteeringContext};
use crate::recorder::{ActivityRecorder, TaskObserver};
use crate::references::extract_references;

/// Executes a single task to completion.
///
/// Implementations never fail: launch errors, crashes and cancellation all
/// resolve to a failed [`TaskResult`].
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(
        &self,
        task: &NormalizedTask,
        steering: Option<&SteeringContext>,
        observer: Arc<dyn TaskObserver>,
        cancel: CancellationToken,
    ) -> TaskResult;
}

/// Worker handler that records activities and tracks the final output.
struct RecordingHandler {
    recorder: Arc<ActivityRecorder>,
    argument_preview_chars: usize,
    final_output: Mutex<Option<String>>,
}

impl RecordingHandler {
    fn new(recorder: Arc<ActivityRecorder>, argument_preview_chars: usize) -> Self {
        Self {
            recorder,
            argument_preview_chars,
            final_output: Mutex::new(None),
        }
    }

    fn final_output(&self) -> String {
        self.final_output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_default()
    }

    fn tool_call_line(&self, name: &str, arguments: &Value) -> String {
        let empty = match arguments {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        };
        if empty {
            return name.to_string();
        }
        let preview = truncate_preview(&arguments.to_string(), self.argument_preview_chars);
        format!("{} {}", name, preview)
    }
}

#[async_trait]
impl WorkerHandler for RecordingHandler {
    async fn on_message(&self, message: WorkerMessage) -> Result<(), SdkError> {
        match message {
            WorkerMessage::Message { message } => {
                if !message.is_assistant() {
                    debug!(role = %message.role, "Ignoring non-assistant message");
                    return Ok(());
                }
                for item in message.content {
                    match item {
                        ContentItem::ToolCall { name, arguments } => {
                            debug!(tool = %name, "Worker called tool");
                            self.recorder
                                .record(ActivityKind::Tool, &self.tool_call_line(&name, &arguments));
                        }
                        ContentItem::Text { text } => {
                            if text.trim().is_empty() {
                                continue;
                            }
                            self.recorder.record(ActivityKind::Assistant, &text);
                            *self
                                .final_output
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner) = Some(text);
                        }
                        ContentItem::Other => {}
                    }
                }
            }
            WorkerMessage::ToolResult {
                text,
                content,
                result,
                is_error,
            } => {
                let body = tool_result_text(text.as_deref(), content.as_ref(), result.as_ref());
                let line = if is_error.unwrap_or(false) {
                    format!("error: {}", body)
                } else {
                    body
                };
                if !line.trim().is_empty() {
                    self.recorder.record(ActivityKind::ToolResult, &line);
                }
            }
            WorkerMessage::Unknown(value) => {
                debug!(
                    event_type = value.get("type").and_then(serde_json::Value::as_str).unwrap_or("?"),
                    "Ignoring worker event"
                );
            }
        }
        Ok(())
    }

    async fn on_stderr_line(&self, line: String) -> Result<(), SdkError> {
        self.recorder.record(ActivityKind::Stderr, &line);
        Ok(())
    }

    async fn on_lifecycle(&self, event: LifecycleEvent) {
        let text = match event {
            LifecycleEvent::Spawned { pid: Some(pid) } => format!("started (pid {})", pid),
            LifecycleEvent::Spawned { pid: None } => "started".to_string(),
            LifecycleEvent::TerminateRequested => "cancellation requested, terminating".to_string(),
            LifecycleEvent::ForceKilled => "grace period elapsed, killed".to_string(),
            LifecycleEvent::Exited { code: Some(code) } => format!("exited with code {}", code),
            LifecycleEvent::Exited { code: None } => "terminated by signal".to_string(),
        };
        self.recorder.record(ActivityKind::Status, &text);
    }
}

/// Resolve a task's working directory against the configured default.
pub fn resolve_work_dir(work_dir: Option<&str>, default: &Path) -> PathBuf {
    match work_dir.map(str::trim).filter(|d| !d.is_empty()) {
        None => default.to_path_buf(),
        Some(dir) => {
            let path = Path::new(dir);
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                default.join(path)
            }
        }
    }
}

/// [`TaskRunner`] that launches the configured worker executable.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    executor: WorkerExecutor,
    config: OrchestratorConfig,
}

impl ProcessRunner {
    pub fn new(config: OrchestratorConfig) -> Self {
        let executor = config.worker_env.iter().fold(
            WorkerExecutor::new(config.worker_program.clone())
                .with_args(config.worker_args.clone())
                .with_grace_period(config.grace_period)
                .with_drain_timeout(config.drain_timeout),
            |executor, (key, value)| executor.with_env(key.clone(), value.clone()),
        );
        Self { executor, config }
    }
}

#[async_trait]
impl TaskRunner for ProcessRunner {
    async fn run(
        &self,
        task: &NormalizedTask,
        steering: Option<&SteeringContext>,
        observer: Arc<dyn TaskObserver>,
        cancel: CancellationToken,
    ) -> TaskResult {
        let work_dir = resolve_work_dir(task.work_dir.as_deref(), &self.config.default_work_dir);
        let recorder = Arc::new(ActivityRecorder::new(
            task.id.clone(),
            self.config.activity_capacity,
            self.config.preview_chars,
            observer,
        ));
        let started_at = Utc::now();

        let (exit_code, stderr, output) = if cancel.is_cancelled() {
            info!(task_id = %task.id, "Batch already cancelled, not starting worker");
            recorder.record(ActivityKind::Status, "cancelled before start");
            (1, ABORTED_MARKER.to_string(), String::new())
        } else {
            let handler = Arc::new(RecordingHandler::new(
                recorder.clone(),
                self.config.argument_preview_chars,
            ));
            let prompt = compose_prompt(task, steering);

            info!(task_id = %task.id, work_dir = %work_dir.display(), steered = steering.is_some(), "Starting task");
            match self
                .executor
                .execute(&work_dir, &prompt, handler.clone(), cancel)
                .await
            {
                Ok(execution) if execution.aborted => {
                    let code = if execution.exit_code == 0 { 1 } else { execution.exit_code };
                    (code, ABORTED_MARKER.to_string(), handler.final_output())
                }
                Ok(execution) => (execution.exit_code, execution.stderr, handler.final_output()),
                Err(e) => {
                    warn!(task_id = %task.id, error = %e, "Worker failed to start");
                    recorder.record(ActivityKind::Status, &format!("failed to start: {}", e));
                    (1, e.to_string(), String::new())
                }
            }
        };

        let finished_at = Utc::now();
        info!(
            task_id = %task.id,
            exit_code,
            activities = recorder.total(),
            duration_ms = (finished_at - started_at).num_milliseconds(),
            "Task finished"
        );

        TaskResult {
            task_id: task.id.clone(),
            prompt: task.prompt.clone(),
            work_dir: work_dir.display().to_string(),
            references: extract_references(&output),
            output,
            exit_code,
            stderr,
            activities: recorder.activities(),
            started_at,
            finished_at,
            steering_notes: steering.map(|s| s.notes.clone()).unwrap_or_default(),
        }
    }
}
