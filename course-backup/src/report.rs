//! Progress and outcome events emitted during a backup run.
//!
//! The pipeline only talks to the [`Reporter`] trait. [`TracingReporter`]
//! turns events into log lines; [`ChannelReporter`] fans them out to
//! broadcast subscribers.

use crate::transfer::progress::{format_bytes, format_duration, RunProgress};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Maximum number of queued events per subscriber
const BROADCAST_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum BackupEvent {
    #[serde(rename = "run:started")]
    RunStarted {
        run_id: String,
        version: String,
        total_courses: usize,
    },

    #[serde(rename = "course:started")]
    CourseStarted {
        course_id: String,
        course_name: String,
    },

    #[serde(rename = "course:completed")]
    CourseCompleted {
        course_id: String,
        course_name: String,
        path: PathBuf,
        size_bytes: u64,
    },

    #[serde(rename = "course:failed")]
    CourseFailed {
        course_id: String,
        course_name: String,
        error: String,
    },

    /// One retention deletion attempt
    #[serde(rename = "version:deleted")]
    VersionDeleted {
        name: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename = "run:completed")]
    RunCompleted {
        run_id: String,
        completed: usize,
        failed: usize,
        bytes: u64,
        deleted_versions: usize,
        duration_secs: u64,
    },
}

/// Sink for [`BackupEvent`]s. Called from concurrently running jobs.
pub trait Reporter: Send + Sync {
    fn report(&self, event: &BackupEvent);
}

/// Logs every event through `tracing`, with a running `[done/total]` counter.
#[derive(Debug, Default)]
pub struct TracingReporter {
    progress: RunProgress,
}

impl TracingReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for TracingReporter {
    fn report(&self, event: &BackupEvent) {
        match event {
            BackupEvent::RunStarted {
                run_id,
                version,
                total_courses,
            } => {
                self.progress.start(*total_courses);
                info!(run_id = %run_id, "Starting course backups on {} ({} courses)", version, total_courses);
            }
            BackupEvent::CourseStarted {
                course_id,
                course_name,
            } => {
                info!(course_id = %course_id, "Downloading {}", course_name);
            }
            BackupEvent::CourseCompleted {
                course_id,
                course_name,
                path,
                size_bytes,
            } => {
                let snap = self.progress.record_completed(*size_bytes);
                info!(
                    course_id = %course_id,
                    path = %path.display(),
                    "[{}/{}] Backed up {} ({})",
                    snap.finished(),
                    snap.total,
                    course_name,
                    format_bytes(*size_bytes)
                );
            }
            BackupEvent::CourseFailed {
                course_id,
                course_name,
                error,
            } => {
                let snap = self.progress.record_failed();
                error!(
                    course_id = %course_id,
                    "[{}/{}] Backup of {} failed: {}",
                    snap.finished(),
                    snap.total,
                    course_name,
                    error
                );
            }
            BackupEvent::VersionDeleted {
                name,
                success: true,
                ..
            } => {
                info!("Deleted version directory {}", name);
            }
            BackupEvent::VersionDeleted { name, error, .. } => {
                warn!(
                    "Could not delete version directory {}: {}",
                    name,
                    error.as_deref().unwrap_or("unknown error")
                );
            }
            BackupEvent::RunCompleted {
                run_id,
                completed,
                failed,
                bytes,
                deleted_versions,
                duration_secs,
            } => {
                info!(
                    run_id = %run_id,
                    "Backup run finished: {} backed up, {} failed, {} downloaded, {} old versions removed, {}",
                    completed,
                    failed,
                    format_bytes(*bytes),
                    deleted_versions,
                    format_duration(*duration_secs)
                );
            }
        }
    }
}

/// Broadcasts events to any number of subscribers.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    tx: broadcast::Sender<BackupEvent>,
}

impl ChannelReporter {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BackupEvent> {
        self.tx.subscribe()
    }
}

impl Default for ChannelReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for ChannelReporter {
    fn report(&self, event: &BackupEvent) {
        // No subscribers is fine
        let _ = self.tx.send(event.clone());
    }
}
