//! Error types for the scheduler.

use crate::config::ConfigError;
use crate::script::CompileError;

/// Errors reported by the bounded queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// The queue is full. Only `try_push` reports this; `push` waits for space instead.
    #[error("queue is at capacity")]
    CapacityExceeded,

    /// The queue was closed because the runtime is shutting down.
    #[error("runtime is shutting down")]
    ShuttingDown,
}

/// Errors that can occur while bootstrapping or driving the runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Poll or waker creation failed, or the poll loop hit an OS error
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// A worker thread could not be started
    #[error("failed to start worker {index}: {source}")]
    WorkerSpawn {
        /// Index of the worker that failed to start
        index: usize,
        /// Underlying OS error
        source: std::io::Error,
    },

    /// An actor script failed to compile
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// The runtime configuration is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A queue refused an envelope
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
