use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that stop the harness from completing a mode.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The operating system refused to start a worker thread.
    #[error("failed to spawn worker thread {worker}")]
    WorkerSpawn {
        /// Zero-based number of the worker that could not be started.
        worker: usize,

        /// The error reported by the operating system.
        #[source]
        source: io::Error,
    },

    /// A worker thread panicked before completing its repetitions.
    #[error("worker thread {worker} panicked")]
    WorkerPanicked {
        /// Zero-based number of the worker that panicked.
        worker: usize,
    },
}

/// A specialized `Result` type for harness operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the filler steps inside [`SyntheticTask`][crate::SyntheticTask].
///
/// [`TaskRunner::run()`][crate::TaskRunner::run] discards these. They are only visible through
/// [`SyntheticTask::try_run()`][crate::SyntheticTask::try_run].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TaskError {
    /// The task output could not be converted to or from JSON.
    #[error("JSON round-trip failed")]
    Json(#[from] serde_json::Error),

    /// A scratch file operation failed.
    #[error("scratch file operation on '{}' failed", .path.display())]
    Io {
        /// Path of the scratch file.
        path: PathBuf,

        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}
