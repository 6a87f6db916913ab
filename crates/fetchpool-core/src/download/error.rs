//! Per-job download errors. Never fatal to the pool.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    /// The external program could not be started (not installed, not executable).
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// The external program ran and reported failure.
    #[error("{program} exited with {status}: {message}")]
    Exited {
        program: String,
        status: String,
        message: String,
    },
    /// The downloader panicked while handling the job.
    #[error("downloader panicked: {0}")]
    Panicked(String),
    /// Any other retrieval or encoding problem.
    #[error("{0}")]
    Other(String),
}

impl DownloadError {
    pub fn other(msg: impl Into<String>) -> Self {
        DownloadError::Other(msg.into())
    }
}
