//! Worker SDK for Scout
//!
//! This crate runs one research worker as a subprocess and turns its
//! line-delimited JSON stdout into typed events for a [`WorkerHandler`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use scout_worker_sdk::{WorkerExecutor, WorkerHandler};
//! use tokio_util::sync::CancellationToken;
//!
//! async fn run_worker(handler: Arc<dyn WorkerHandler>) -> Result<(), Box<dyn std::error::Error>> {
//!     let executor = WorkerExecutor::new("pi").with_args(["--mode", "json", "-p"]);
//!     let cancel = CancellationToken::new();
//!
//!     let result = executor
//!         .execute(Path::new("."), "What changed in tokio 1.40?", handler, cancel)
//!         .await?;
//!
//!     println!("exit code: {}", result.exit_code);
//!     Ok(())
//! }
//! ```

mod error;
mod executor;
mod protocol;
mod types;

// Re-export main types
pub use error::SdkError;
pub use executor::{ExecutionResult, WorkerExecutor, DEFAULT_DRAIN_TIMEOUT, DEFAULT_GRACE_PERIOD};
pub use protocol::{parse_line, LineBuffer, WorkerHandler};
pub use types::{
    tool_result_text, value_to_text, AgentMessage, ContentItem, LifecycleEvent, WorkerMessage,
};
