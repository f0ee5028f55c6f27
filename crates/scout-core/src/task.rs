//! Raw and normalized task types, and the normalizer that turns one into the other.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::TaskId;

/// A task as supplied by the caller, before ids are made unique.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTask {
    /// Optional caller-chosen identifier.
    #[serde(default)]
    pub id: Option<String>,

    /// What the worker should research.
    pub prompt: String,

    /// Working directory override for this task's worker.
    #[serde(default, alias = "cwd")]
    pub work_dir: Option<String>,
}

impl RawTask {
    /// Create a raw task without an id or working directory.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            id: None,
            prompt: prompt.into(),
            work_dir: None,
        }
    }

    /// Builder method to set the caller id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Builder method to set the working directory.
    pub fn with_work_dir(mut self, dir: impl Into<String>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }
}

/// A task with an id that is unique within its batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedTask {
    pub id: TaskId,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<String>,
}

/// Assign unique, filesystem-safe ids to a batch of raw tasks.
///
/// The output is one-to-one with the input and keeps its order. Caller ids are
/// slugified; a task without a usable id becomes `task-<position>` (1-based).
/// Collisions with ids assigned earlier in the batch get `-2`, `-3`, ... appended.
pub fn normalize_tasks(tasks: &[RawTask]) -> Vec<NormalizedTask> {
    let mut used: HashSet<String> = HashSet::with_capacity(tasks.len());

    tasks
        .iter()
        .enumerate()
        .map(|(index, task)| {
            let mut base = task.id.as_deref().map(slugify).unwrap_or_default();
            if base.is_empty() {
                base = format!("task-{}", index + 1);
            }

            let mut candidate = base.clone();
            let mut suffix = 2;
            while used.contains(&candidate) {
                candidate = format!("{}-{}", base, suffix);
                suffix += 1;
            }
            used.insert(candidate.clone());

            NormalizedTask {
                id: TaskId::new(candidate),
                prompt: task.prompt.clone(),
                work_dir: task.work_dir.clone(),
            }
        })
        .collect()
}

fn slugify(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    for ch in raw.trim().to_lowercase().chars() {
        let keep = ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' || ch == '-';
        let ch = if keep { ch } else { '-' };
        if ch == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(ch);
    }
    slug.trim_matches(|c| c == '-' || c == '_').to_string()
}
