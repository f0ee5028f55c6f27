//! Scout orchestrator.
//!
//! Fans a batch of research tasks out to worker processes under a
//! concurrency cap, streams their activity to a progress sink, keeps recent
//! runs in memory, and re-runs a single task with extra guidance on request.
//!
//! # Example
//!
//! ```rust,no_run
//! use scout_core::RawTask;
//! use scout_orchestrator::{BatchRequest, OrchestratorConfig, ResearchService};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = ResearchService::new(OrchestratorConfig::default());
//! let outcome = service
//!     .run_batch(
//!         BatchRequest {
//!             tasks: vec![RawTask::new("Compare OAuth device flow providers")],
//!             concurrency: None,
//!         },
//!         CancellationToken::new(),
//!         None,
//!     )
//!     .await?;
//! println!("{}", outcome.text);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod progress;
pub mod prompt;
pub mod recorder;
pub mod references;
pub mod registry;
pub mod runner;
pub mod scheduler;
pub mod service;

pub use config::OrchestratorConfig;
pub use error::OrchestratorError;
pub use format::{format_duration, format_run, format_steered_task, format_task};
pub use progress::{render_progress, ProgressCallback, ProgressTracker, ProgressUpdate, TaskProgress};
pub use prompt::{compose_prompt, SteeringContext};
pub use recorder::{ActivityRecorder, NoopObserver, TaskObserver};
pub use references::extract_references;
pub use registry::{RunRegistry, DEFAULT_REGISTRY_CAPACITY};
pub use runner::{resolve_work_dir, ProcessRunner, TaskRunner};
pub use scheduler::{clamp_concurrency, run_bounded};
pub use service::{validate_concurrency, BatchOutcome, BatchRequest, ResearchService, SteerRequest};
