//! Custom error types for the course backup pipeline.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Course list error: {0}")]
    CourseList(String),

    #[error("Remote request failed: {0}")]
    RemoteRequest(String),

    #[error("{what} returned HTTP {status}")]
    HttpStatus { what: String, status: u16 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote export {export_id} ended in state '{state}'")]
    RemoteJobFailed { export_id: u64, state: String },

    #[error("Remote export {export_id} not ready after {attempts} polls")]
    PollTimeout { export_id: u64, attempts: u32 },

    #[error("Download stream error: {0}")]
    DownloadStream(String),

    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid file name: {0}")]
    InvalidName(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

impl BackupError {
    /// Wrap an I/O error with the path it happened on.
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BackupError::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Build an error from a non-success HTTP status.
    pub fn status(what: &str, status: reqwest::StatusCode) -> Self {
        BackupError::HttpStatus {
            what: what.to_string(),
            status: status.as_u16(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
