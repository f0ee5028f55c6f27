//! Orchestrator configuration.

use std::path::PathBuf;
use std::time::Duration;

use scout_core::DEFAULT_ACTIVITY_CAPACITY;
use scout_worker_sdk::{DEFAULT_DRAIN_TIMEOUT, DEFAULT_GRACE_PERIOD};

use crate::registry::DEFAULT_REGISTRY_CAPACITY;

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Worker executable, resolved through PATH when not absolute.
    pub worker_program: String,

    /// Arguments placed before the composed prompt.
    pub worker_args: Vec<String>,

    /// Extra environment variables set for every worker.
    pub worker_env: Vec<(String, String)>,

    /// Time between the terminate request and the forced kill.
    pub grace_period: Duration,

    /// Time to keep draining worker output after it exits.
    pub drain_timeout: Duration,

    /// Activities retained per task.
    pub activity_capacity: usize,

    /// Maximum characters of an activity line.
    pub preview_chars: usize,

    /// Maximum characters of a tool call's argument preview.
    pub argument_preview_chars: usize,

    /// Completed runs kept for steering.
    pub registry_capacity: usize,

    /// Concurrency used when the caller does not supply one.
    pub default_concurrency: usize,

    /// Largest concurrency a caller may request.
    pub max_concurrency: usize,

    /// Recent activities shown per task in reports.
    pub report_activity_tail: usize,

    /// Working directory for tasks without an override; relative overrides
    /// are resolved against it.
    pub default_work_dir: PathBuf,
}

impl OrchestratorConfig {
    /// Set the worker executable.
    pub fn with_worker(mut self, program: impl Into<String>) -> Self {
        self.worker_program = program.into();
        self
    }

    /// Replace the worker arguments.
    pub fn with_worker_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.worker_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Add an environment variable for the worker.
    pub fn with_worker_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.worker_env.push((key.into(), value.into()));
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    pub fn with_default_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.default_work_dir = dir.into();
        self
    }

    pub fn with_registry_capacity(mut self, capacity: usize) -> Self {
        self.registry_capacity = capacity;
        self
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            worker_program: "pi".to_string(),
            worker_args: vec![
                "--mode".to_string(),
                "json".to_string(),
                "-p".to_string(),
                "--no-session".to_string(),
            ],
            worker_env: Vec::new(),
            grace_period: DEFAULT_GRACE_PERIOD,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            activity_capacity: DEFAULT_ACTIVITY_CAPACITY,
            preview_chars: 200,
            argument_preview_chars: 120,
            registry_capacity: DEFAULT_REGISTRY_CAPACITY,
            default_concurrency: 2,
            max_concurrency: 4,
            report_activity_tail: 8,
            default_work_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}
