//! Error types for the worker SDK.

use thiserror::Error;

/// Errors that can occur while running a worker process.
#[derive(Debug, Error)]
pub enum SdkError {
    /// The worker executable could not be started.
    #[error("Failed to start worker '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O failure while supervising a running worker.
    #[error("I/O error while supervising worker: {0}")]
    Io(#[from] std::io::Error),

    /// The worker's stdio was not wired up as expected.
    #[error("Protocol error: {0}")]
    ProtocolError(String),
}
