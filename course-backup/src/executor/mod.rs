//! Backup run orchestration.
//!
//! A run stamps one version directory, exports every course through a
//! [`ConcurrencyLimiter`], waits for all of them, and only then prunes old
//! version directories.

pub mod job;
pub mod limiter;


pub use job::{CourseFailure, CourseOutcome, DownloadedArtifact, JobContext, JobState, RemoteExportJob};
pub use limiter::ConcurrencyLimiter;

use crate::canvas::ExportApi;
use crate::config::{ExportConfig, RetryConfig};
use crate::courses::Course;
use crate::fs::{NameResolver, RetentionManager, RetentionReport};
use crate::report::{BackupEvent, Reporter};
use crate::utils::errors::{BackupError, Result};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

/// strftime pattern for version directory names, e.g. `2026Y-10M-17D 14h05m`.
pub const VERSION_FORMAT: &str = "%YY-%mM-%dD %Hh%Mm";

pub fn version_name(at: &DateTime<Local>) -> String {
    at.format(VERSION_FORMAT).to_string()
}

/// Where a run writes and how many versions it keeps.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub domain: String,
    pub destination_root: PathBuf,
    pub version_limit: usize,
}

/// How each course export is driven.
#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub max_concurrent: usize,
    pub poll_interval: Duration,
    /// `None` polls until the remote job reaches a terminal state
    pub max_poll_attempts: Option<u32>,
    pub archive_extension: String,
    pub retry: RetryConfig,
}

impl Default for ExportSettings {
    fn default() -> Self {
        let export = ExportConfig::default();
        Self {
            max_concurrent: export.max_concurrent,
            poll_interval: Duration::from_millis(export.poll_interval_ms),
            max_poll_attempts: export.max_poll_attempts,
            archive_extension: export.archive_extension,
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug)]
pub struct RunSummary {
    pub run_id: String,
    pub version: String,
    /// `None` when there were no courses to back up
    pub version_dir: Option<PathBuf>,
    pub completed: Vec<DownloadedArtifact>,
    pub failed: Vec<CourseFailure>,
    pub retention: RetentionReport,
    pub duration: Duration,
}

impl RunSummary {
    pub fn total_bytes(&self) -> u64 {
        self.completed.iter().map(|a| a.size_bytes).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct BackupSession {
    config: RunConfig,
    settings: ExportSettings,
    api: Arc<dyn ExportApi>,
    reporter: Arc<dyn Reporter>,
}

impl BackupSession {
    pub fn new(
        config: RunConfig,
        settings: ExportSettings,
        api: Arc<dyn ExportApi>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            config,
            settings,
            api,
            reporter,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Back up `courses` into a version directory stamped with the current
    /// local time.
    pub async fn run(&self, courses: &[Course]) -> Result<RunSummary> {
        self.run_at(courses, Local::now()).await
    }

    /// Same as [`run`](Self::run) with an explicit version timestamp.
    ///
    /// Only a failure to create the destination root aborts the run.
    /// Per-course failures are collected in the summary.
    pub async fn run_at(&self, courses: &[Course], started_at: DateTime<Local>) -> Result<RunSummary> {
        let started = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        let root = &self.config.destination_root;

        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| BackupError::fs(root, e))?;

        let version = version_name(&started_at);
        let version_dir = root.join(&version);

        info!(
            run_id = %run_id,
            domain = %self.config.domain,
            root = %root.display(),
            "Backup run starting"
        );
        self.reporter.report(&BackupEvent::RunStarted {
            run_id: run_id.clone(),
            version: version.clone(),
            total_courses: courses.len(),
        });

        let (completed, failed) = if courses.is_empty() {
            warn!("Course list is empty, nothing to back up");
            (Vec::new(), Vec::new())
        } else {
            self.export_all(courses, &version, &version_dir).await
        };

        // Every job is terminal here; pruning never races a download.
        let retention = self.enforce_retention().await;
        for deletion in &retention.deletions {
            self.reporter.report(&BackupEvent::VersionDeleted {
                name: deletion.name.clone(),
                success: deletion.succeeded(),
                error: deletion.error.clone(),
            });
        }

        let summary = RunSummary {
            run_id,
            version,
            version_dir: (!courses.is_empty()).then_some(version_dir),
            completed,
            failed,
            retention,
            duration: started.elapsed(),
        };

        self.reporter.report(&BackupEvent::RunCompleted {
            run_id: summary.run_id.clone(),
            completed: summary.completed.len(),
            failed: summary.failed.len(),
            bytes: summary.total_bytes(),
            deleted_versions: summary.retention.deleted_count(),
            duration_secs: summary.duration.as_secs(),
        });

        Ok(summary)
    }

    async fn export_all(
        &self,
        courses: &[Course],
        version: &str,
        version_dir: &Path,
    ) -> (Vec<DownloadedArtifact>, Vec<CourseFailure>) {
        // Jobs create it again before writing, so a failure here is only
        // reported through them.
        if let Err(e) = tokio::fs::create_dir_all(version_dir).await {
            warn!(path = %version_dir.display(), error = %e, "Could not create version directory");
        }

        let ctx = Arc::new(JobContext {
            api: self.api.clone(),
            names: Arc::new(NameResolver::new(self.settings.archive_extension.clone())),
            reporter: self.reporter.clone(),
            settings: self.settings.clone(),
            version: version.to_string(),
            version_dir: version_dir.to_path_buf(),
        });

        let limiter = ConcurrencyLimiter::new(self.settings.max_concurrent);
        let jobs = courses
            .iter()
            .cloned()
            .map(|course| RemoteExportJob::new(course, ctx.clone()).run());
        let outcomes = limiter.run_all(jobs).await;

        let mut completed = Vec::new();
        let mut failed = Vec::new();
        for (course, outcome) in courses.iter().zip(outcomes) {
            match outcome {
                Ok(CourseOutcome::Completed(artifact)) => completed.push(artifact),
                Ok(CourseOutcome::Failed(failure)) => failed.push(failure),
                Err(e) => {
                    let error = format!("export task aborted: {}", e);
                    error!(course_id = %course.id, "{}", error);
                    self.reporter.report(&BackupEvent::CourseFailed {
                        course_id: course.id.clone(),
                        course_name: course.name.clone(),
                        error: error.clone(),
                    });
                    failed.push(CourseFailure {
                        course: course.clone(),
                        error,
                    });
                }
            }
        }

        (completed, failed)
    }

    async fn enforce_retention(&self) -> RetentionReport {
        let manager = RetentionManager::new(self.config.destination_root.clone(), self.config.version_limit);

        match tokio::task::spawn_blocking(move || manager.enforce()).await {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                error!("Retention pass failed: {}", e);
                RetentionReport::default()
            }
            Err(e) => {
                error!("Retention task aborted: {}", e);
                RetentionReport::default()
            }
        }
    }
}
