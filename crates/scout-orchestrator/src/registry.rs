//! Bounded in-memory history of completed runs.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use scout_core::{NormalizedTask, RunId, RunRecord, TaskId};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::OrchestratorError;
use crate::prompt::SteeringContext;
use crate::recorder::TaskObserver;
use crate::runner::TaskRunner;

/// Runs kept before the oldest insertion is evicted.
pub const DEFAULT_REGISTRY_CAPACITY: usize = 20;

#[derive(Default)]
struct Entries {
    records: HashMap<RunId, RunRecord>,
    /// Run ids by first insertion, oldest first.
    order: VecDeque<RunId>,
}

/// Insertion-ordered, bounded store of run records.
pub struct RunRegistry {
    capacity: usize,
    entries: RwLock<Entries>,
}

impl RunRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: RwLock::new(Entries::default()),
        }
    }

    /// Insert or overwrite a record. Overwriting keeps the run's original
    /// position in the eviction order.
    pub async fn remember(&self, record: RunRecord) {
        let mut entries = self.entries.write().await;
        let run_id = record.run_id.clone();
        if entries.records.insert(run_id.clone(), record).is_none() {
            entries.order.push_back(run_id.clone());
            debug!(run_id = %run_id, "Stored run");
        }

        while entries.order.len() > self.capacity {
            if let Some(evicted) = entries.order.pop_front() {
                entries.records.remove(&evicted);
                info!(run_id = %evicted, "Evicted oldest run from registry");
            }
        }
    }

    pub async fn lookup(&self, run_id: &RunId) -> Option<RunRecord> {
        self.entries.read().await.records.get(run_id).cloned()
    }

    /// Stored run ids, oldest first.
    pub async fn known_run_ids(&self) -> Vec<RunId> {
        self.entries.read().await.order.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Find a run and the position of one of its tasks.
    pub async fn resolve(
        &self,
        run_id: &RunId,
        task_id: &TaskId,
    ) -> Result<(RunRecord, usize), OrchestratorError> {
        let entries = self.entries.read().await;
        let record = entries
            .records
            .get(run_id)
            .ok_or_else(|| OrchestratorError::RunNotFound {
                run_id: run_id.clone(),
                known: entries.order.iter().cloned().collect(),
            })?;
        let index = record
            .task_index(task_id)
            .ok_or_else(|| OrchestratorError::TaskNotFound {
                run_id: run_id.clone(),
                task_id: task_id.clone(),
                known: record.task_ids(),
            })?;
        Ok((record.clone(), index))
    }

    /// Re-run one task of a stored run with an added instruction and store
    /// the new result in its place.
    ///
    /// The worker sees every instruction given so far and its previous
    /// output. Returns the updated record and the task's index. Nothing is
    /// stored when the run or task is unknown.
    pub async fn steer(
        &self,
        runner: &dyn TaskRunner,
        run_id: &RunId,
        task_id: &TaskId,
        instruction: &str,
        observer: Arc<dyn TaskObserver>,
        cancel: CancellationToken,
    ) -> Result<(RunRecord, usize), OrchestratorError> {
        let (record, index) = self.resolve(run_id, task_id).await?;
        let previous = &record.tasks[index];

        let mut notes = previous.steering_notes.clone();
        let instruction = instruction.trim();
        if !instruction.is_empty() {
            notes.push(instruction.to_string());
        }
        let steering = SteeringContext {
            notes,
            previous_output: Some(previous.output.clone()).filter(|o| !o.trim().is_empty()),
        };
        let task = NormalizedTask {
            id: previous.task_id.clone(),
            prompt: previous.prompt.clone(),
            work_dir: Some(previous.work_dir.clone()),
        };

        info!(run_id = %run_id, task_id = %task_id, notes = steering.notes.len(), "Steering task");
        let result = runner.run(&task, Some(&steering), observer, cancel).await;

        // Another steer may have replaced a sibling task meanwhile, so splice
        // into whatever is stored now.
        let mut entries = self.entries.write().await;
        if let Some(current) = entries.records.get_mut(run_id) {
            let slot = current.task_index(task_id).unwrap_or(index);
            current.tasks[slot] = result;
            return Ok((current.clone(), slot));
        }
        drop(entries);

        // Evicted while the worker ran; store it again.
        let mut restored = record;
        restored.tasks[index] = result;
        self.remember(restored.clone()).await;
        Ok((restored, index))
    }
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_REGISTRY_CAPACITY)
    }
}
