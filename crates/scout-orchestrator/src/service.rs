//! The two caller-facing operations: run a batch, and steer one task of a
//! stored run.

use std::sync::Arc;

use scout_core::{
    normalize_tasks, NormalizedTask, RawTask, RunDetails, RunId, RunRecord, TaskId, TaskResult,
    TaskStatus,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::OrchestratorConfig;
use crate::error::OrchestratorError;
use crate::format::{format_run, format_steered_task};
use crate::progress::{ProgressCallback, ProgressTracker};
use crate::recorder::TaskObserver;
use crate::registry::RunRegistry;
use crate::runner::{ProcessRunner, TaskRunner};
use crate::scheduler::run_bounded;

/// Input of a batch run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub tasks: Vec<RawTask>,

    /// Parsed as a number so non-integers can be rejected with a message
    /// instead of a type error.
    #[serde(default)]
    pub concurrency: Option<f64>,
}

/// Input of a steer invocation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SteerRequest {
    pub run_id: RunId,
    pub task_id: TaskId,
    pub instruction: String,
}

/// Structured details plus the rendered report.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub details: RunDetails,
    pub text: String,
}

/// Check a requested concurrency. `None` falls back to `default`.
pub fn validate_concurrency(
    requested: Option<f64>,
    default: usize,
    max: usize,
) -> Result<usize, OrchestratorError> {
    let Some(value) = requested else {
        return Ok(default);
    };
    if !value.is_finite() || value.fract() != 0.0 || value < 1.0 || value > max as f64 {
        return Err(OrchestratorError::InvalidConcurrency {
            value: value.to_string(),
            max,
        });
    }
    Ok(value as usize)
}

/// Runs research batches and keeps their results for steering.
pub struct ResearchService {
    config: OrchestratorConfig,
    runner: Arc<dyn TaskRunner>,
    registry: RunRegistry,
}

impl ResearchService {
    /// Service that launches the configured worker executable.
    pub fn new(config: OrchestratorConfig) -> Self {
        let runner = Arc::new(ProcessRunner::new(config.clone()));
        Self::with_runner(config, runner)
    }

    pub fn with_runner(config: OrchestratorConfig, runner: Arc<dyn TaskRunner>) -> Self {
        let registry = RunRegistry::new(config.registry_capacity);
        Self {
            config,
            runner,
            registry,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }

    /// Run every task with bounded concurrency and store the run.
    ///
    /// Worker failures do not make this fail; only an invalid concurrency
    /// does. Cancelling `cancel` aborts every task still in flight.
    pub async fn run_batch(
        &self,
        request: BatchRequest,
        cancel: CancellationToken,
        progress: Option<ProgressCallback>,
    ) -> Result<BatchOutcome, OrchestratorError> {
        let limit = validate_concurrency(
            request.concurrency,
            self.config.default_concurrency,
            self.config.max_concurrency,
        )?;
        let tasks = normalize_tasks(&request.tasks);
        let run_id = RunId::generate();
        info!(run_id = %run_id, tasks = tasks.len(), concurrency = limit, "Starting research run");

        let tracker = Arc::new(ProgressTracker::new(run_id.clone(), &tasks, progress));
        tracker.publish();

        let results = run_bounded(&tasks, limit, |_, task| {
            self.run_tracked(task, tracker.clone(), cancel.clone())
        })
        .await;

        let record = RunRecord::new(run_id, results);
        self.registry.remember(record.clone()).await;

        let details = RunDetails::from(&record);
        info!(
            run_id = %details.run_id,
            succeeded = details.success_count,
            total = details.total_count,
            "Research run finished"
        );
        let text = format_run(&details, self.config.report_activity_tail);
        Ok(BatchOutcome { details, text })
    }

    /// Re-run one task of a stored run with an extra instruction.
    ///
    /// Unknown run or task ids are rejected without touching the registry.
    pub async fn steer(
        &self,
        request: SteerRequest,
        cancel: CancellationToken,
        progress: Option<ProgressCallback>,
    ) -> Result<BatchOutcome, OrchestratorError> {
        let (record, index) = self
            .registry
            .resolve(&request.run_id, &request.task_id)
            .await?;
        let previous = &record.tasks[index];
        let tracked = [NormalizedTask {
            id: previous.task_id.clone(),
            prompt: previous.prompt.clone(),
            work_dir: Some(previous.work_dir.clone()),
        }];
        let tracker = Arc::new(ProgressTracker::new(request.run_id.clone(), &tracked, progress));
        tracker.set_status(&request.task_id, TaskStatus::Running);

        let (record, index) = self
            .registry
            .steer(
                self.runner.as_ref(),
                &request.run_id,
                &request.task_id,
                &request.instruction,
                tracker.clone(),
                cancel,
            )
            .await?;

        let task = &record.tasks[index];
        tracker.set_status(&task.task_id, terminal_status(task.is_success()));

        let text = format_steered_task(
            &record.run_id,
            index,
            task,
            self.config.report_activity_tail,
        );
        Ok(BatchOutcome {
            details: RunDetails::from(&record),
            text,
        })
    }

    async fn run_tracked(
        &self,
        task: &NormalizedTask,
        tracker: Arc<ProgressTracker>,
        cancel: CancellationToken,
    ) -> TaskResult {
        tracker.set_status(&task.id, TaskStatus::Running);
        let observer: Arc<dyn TaskObserver> = tracker.clone();
        let result = self.runner.run(task, None, observer, cancel).await;
        tracker.set_status(&task.id, terminal_status(result.is_success()));
        result
    }
}

fn terminal_status(success: bool) -> TaskStatus {
    if success {
        TaskStatus::Completed
    } else {
        TaskStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use scout_core::ActivityKind;

    use crate::progress::ProgressUpdate;
    use crate::prompt::SteeringContext;
    use crate::recorder::ActivityRecorder;

    /// Succeeds unless the prompt mentions "fail"; earlier tasks finish last.
    struct ScriptedRunner;

    #[async_trait]
    impl TaskRunner for ScriptedRunner {
        async fn run(
            &self,
            task: &NormalizedTask,
            steering: Option<&SteeringContext>,
            observer: Arc<dyn TaskObserver>,
            cancel: CancellationToken,
        ) -> TaskResult {
            let recorder = ActivityRecorder::new(task.id.clone(), 10, 200, observer);
            recorder.record(ActivityKind::Status, "started");
            let delay = if task.id.as_str() == "first" { 30 } else { 5 };
            tokio::time::sleep(Duration::from_millis(delay)).await;

            let failed = task.prompt.contains("fail") || cancel.is_cancelled();
            let notes = steering.map(|s| s.notes.clone()).unwrap_or_default();
            let now = Utc::now();
            TaskResult {
                task_id: task.id.clone(),
                prompt: task.prompt.clone(),
                work_dir: task.work_dir.clone().unwrap_or_else(|| "/work".to_string()),
                output: format!("answer for {} https://ref.test/{}", task.id, notes.len()),
                references: vec![format!("https://ref.test/{}", notes.len())],
                exit_code: if failed { 1 } else { 0 },
                stderr: if failed { "failed".to_string() } else { String::new() },
                activities: recorder.activities(),
                started_at: now,
                finished_at: now,
                steering_notes: notes,
            }
        }
    }

    fn service() -> ResearchService {
        ResearchService::with_runner(OrchestratorConfig::default(), Arc::new(ScriptedRunner))
    }

    fn request(concurrency: Option<f64>) -> BatchRequest {
        BatchRequest {
            tasks: vec![
                RawTask::new("look around").with_id("First"),
                RawTask::new("this will fail").with_id("second"),
            ],
            concurrency,
        }
    }

    #[test]
    fn test_validate_concurrency() {
        assert_eq!(validate_concurrency(None, 2, 4).unwrap(), 2);
        assert_eq!(validate_concurrency(Some(4.0), 2, 4).unwrap(), 4);
        assert_eq!(validate_concurrency(Some(1.0), 2, 4).unwrap(), 1);
        for bad in [1.5, 0.0, 5.0, -1.0, f64::NAN] {
            assert!(validate_concurrency(Some(bad), 2, 4).is_err(), "{}", bad);
        }
        let err = validate_concurrency(Some(1.5), 2, 4).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid concurrency 1.5: expected a whole number between 1 and 4"
        );
    }

    #[test]
    fn test_batch_request_from_json() {
        let request: BatchRequest = serde_json::from_str(
            r#"{"tasks":[{"id":"a","prompt":"p","cwd":"docs"}],"concurrency":3}"#,
        )
        .unwrap();
        assert_eq!(request.concurrency, Some(3.0));
        assert_eq!(request.tasks[0].work_dir.as_deref(), Some("docs"));
    }

    #[tokio::test]
    async fn test_run_batch_orders_and_counts() {
        let service = service();
        let updates: Arc<Mutex<Vec<ProgressUpdate>>> = Arc::default();
        let sink_updates = updates.clone();
        let sink: ProgressCallback = Arc::new(move |u: &ProgressUpdate| {
            sink_updates.lock().unwrap().push(u.clone());
        });

        let outcome = service
            .run_batch(request(Some(2.0)), CancellationToken::new(), Some(sink))
            .await
            .unwrap();

        let ids: Vec<&str> = outcome.details.tasks.iter().map(|t| t.task_id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
        assert_eq!(outcome.details.success_count, 1);
        assert_eq!(outcome.details.total_count, 2);
        assert!(outcome.text.contains("### 1. first [completed]"));
        assert!(outcome.text.contains("### 2. second [failed]"));
        assert!(service.registry().lookup(&outcome.details.run_id).await.is_some());

        let updates = updates.lock().unwrap();
        assert_eq!(updates.first().map(|u| u.finished), Some(0));
        assert_eq!(updates.last().map(|u| u.finished), Some(2));
        assert!(updates.iter().any(|u| u.tasks[0].activity_count == 1));
    }

    #[tokio::test]
    async fn test_invalid_concurrency_runs_nothing() {
        let service = service();
        let err = service
            .run_batch(request(Some(0.0)), CancellationToken::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidConcurrency { .. }));
        assert!(service.registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_steer_replaces_one_task() {
        let service = service();
        let outcome = service
            .run_batch(request(None), CancellationToken::new(), None)
            .await
            .unwrap();
        let run_id = outcome.details.run_id.clone();

        let steered = service
            .steer(
                SteerRequest {
                    run_id: run_id.clone(),
                    task_id: TaskId::new("second"),
                    instruction: "Use official docs".to_string(),
                },
                CancellationToken::new(),
                None,
            )
            .await
            .unwrap();

        assert_eq!(steered.details.tasks[0], outcome.details.tasks[0]);
        assert_eq!(steered.details.tasks[1].steering_notes, vec!["Use official docs"]);
        assert!(steered.text.starts_with("Steered task second in run "));
        assert!(steered.text.contains("### 2. second"));

        let err = service
            .steer(
                SteerRequest {
                    run_id,
                    task_id: TaskId::new("third"),
                    instruction: "x".to_string(),
                },
                CancellationToken::new(),
                None,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Known task ids: first, second"));
    }
}
