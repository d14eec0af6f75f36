//! One course's trip through the remote export lifecycle.
//!
//! ```text
//! Requested -> Polling -> Resolving -> Downloading -> Completed
//!     \           \            \             \
//!      `-----------`------------`-------------`----> Failed
//! ```

use super::ExportSettings;
use crate::canvas::{ByteStream, ExportApi};
use crate::courses::Course;
use crate::fs::NameResolver;
use crate::report::{BackupEvent, Reporter};
use crate::retry::with_retry;
use crate::transfer::{ProgressCallback, ProgressStream};
use crate::utils::errors::{BackupError, Result};
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Requested,
    Polling,
    Resolving,
    Downloading,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// An archive written to the version directory.
#[derive(Debug, Clone)]
pub struct DownloadedArtifact {
    pub path: PathBuf,
    pub course_id: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct CourseFailure {
    pub course: Course,
    pub error: String,
}

/// Terminal result of one job.
#[derive(Debug, Clone)]
pub enum CourseOutcome {
    Completed(DownloadedArtifact),
    Failed(CourseFailure),
}

/// Everything the jobs of one run share.
pub struct JobContext {
    pub api: Arc<dyn ExportApi>,
    pub names: Arc<NameResolver>,
    pub reporter: Arc<dyn Reporter>,
    pub settings: ExportSettings,
    pub version: String,
    pub version_dir: PathBuf,
}

pub struct RemoteExportJob {
    course: Course,
    ctx: Arc<JobContext>,
    state: JobState,
    export_id: Option<u64>,
    progress_url: Option<String>,
    attachment_url: Option<String>,
}

impl RemoteExportJob {
    pub fn new(course: Course, ctx: Arc<JobContext>) -> Self {
        Self {
            course,
            ctx,
            state: JobState::Requested,
            export_id: None,
            progress_url: None,
            attachment_url: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> JobState {
        self.state
    }

    /// Drive the course to a terminal state. Errors never escape; they are
    /// logged, reported, and returned as [`CourseOutcome::Failed`].
    pub async fn run(mut self) -> CourseOutcome {
        self.ctx.reporter.report(&BackupEvent::CourseStarted {
            course_id: self.course.id.clone(),
            course_name: self.course.name.clone(),
        });

        match self.drive().await {
            Ok(artifact) => {
                self.transition(JobState::Completed);
                self.ctx.reporter.report(&BackupEvent::CourseCompleted {
                    course_id: self.course.id.clone(),
                    course_name: self.course.name.clone(),
                    path: artifact.path.clone(),
                    size_bytes: artifact.size_bytes,
                });
                CourseOutcome::Completed(artifact)
            }
            Err(e) => {
                let failed_in = self.state;
                self.transition(JobState::Failed);
                error!(
                    course_id = %self.course.id,
                    course_name = %self.course.name,
                    export_id = ?self.export_id,
                    progress_url = ?self.progress_url,
                    attachment_url = ?self.attachment_url,
                    stage = ?failed_in,
                    error = %e,
                    "Course export failed"
                );
                self.ctx.reporter.report(&BackupEvent::CourseFailed {
                    course_id: self.course.id.clone(),
                    course_name: self.course.name.clone(),
                    error: e.to_string(),
                });
                CourseOutcome::Failed(CourseFailure {
                    course: self.course,
                    error: e.to_string(),
                })
            }
        }
    }

    fn transition(&mut self, next: JobState) {
        debug_assert!(!self.state.is_terminal(), "terminal export job changed state");
        debug!(course_id = %self.course.id, from = ?self.state, to = ?next, "Export job state change");
        self.state = next;
    }

    async fn drive(&mut self) -> Result<DownloadedArtifact> {
        let ctx = self.ctx.clone();

        // Never retried: a second create would start a second remote export.
        let export = ctx.api.create_export(&self.course.id).await?;
        self.export_id = Some(export.id);
        let progress_url = export.progress_url.ok_or_else(|| {
            BackupError::RemoteRequest(format!("export {} has no progress url", export.id))
        })?;
        self.progress_url = Some(progress_url.clone());
        self.transition(JobState::Polling);

        self.poll_until_ready(export.id, &progress_url).await?;
        self.transition(JobState::Resolving);

        let course_id = self.course.id.clone();
        let url = with_retry(&ctx.settings.retry, || {
            ctx.api.get_export_result(&course_id, export.id)
        })
        .await?;
        self.attachment_url = Some(url.clone());
        self.transition(JobState::Downloading);

        self.download(&url).await
    }

    async fn poll_until_ready(&self, export_id: u64, progress_url: &str) -> Result<()> {
        let ctx = &self.ctx;
        let mut attempts: u32 = 0;

        loop {
            tokio::time::sleep(ctx.settings.poll_interval).await;
            attempts += 1;

            let progress = with_retry(&ctx.settings.retry, || ctx.api.get_progress(progress_url)).await?;

            if progress.is_complete() {
                debug!(course_id = %self.course.id, export_id, attempts, "Export ready");
                return Ok(());
            }
            if progress.is_failed() {
                return Err(BackupError::RemoteJobFailed {
                    export_id,
                    state: progress.workflow_state,
                });
            }
            if let Some(max) = ctx.settings.max_poll_attempts {
                if attempts >= max {
                    return Err(BackupError::PollTimeout { export_id, attempts });
                }
            }
        }
    }

    async fn download(&self, url: &str) -> Result<DownloadedArtifact> {
        let ctx = &self.ctx;

        tokio::fs::create_dir_all(&ctx.version_dir)
            .await
            .map_err(|e| BackupError::fs(&ctx.version_dir, e))?;

        let stream = with_retry(&ctx.settings.retry, || ctx.api.stream_download(url)).await?;

        let (path, file) = ctx
            .names
            .reserve(&self.course, &ctx.version, &ctx.version_dir)?;

        match write_stream(stream, file, &path, &self.course.id).await {
            Ok(size_bytes) => {
                info!(course_id = %self.course.id, path = %path.display(), size_bytes, "Archive downloaded");
                Ok(DownloadedArtifact {
                    path,
                    course_id: self.course.id.clone(),
                    size_bytes,
                })
            }
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(&path).await {
                    debug!(path = %path.display(), error = %rm, "Could not remove partial archive");
                }
                Err(e)
            }
        }
    }
}

/// Copy the archive stream into `file` chunk by chunk.
async fn write_stream(stream: ByteStream, file: std::fs::File, path: &Path, course_id: &str) -> Result<u64> {
    let course_id = course_id.to_string();
    let callback: ProgressCallback = Arc::new(move |bytes| {
        debug!(course_id = %course_id, bytes, "Download progress");
    });

    let mut stream = ProgressStream::new(stream, callback);
    let mut file = tokio::fs::File::from_std(file);
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| BackupError::DownloadStream(e.to_string()))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| BackupError::fs(path, e))?;
        written += chunk.len() as u64;
    }

    file.flush().await.map_err(|e| BackupError::fs(path, e))?;
    file.sync_all().await.map_err(|e| BackupError::fs(path, e))?;

    Ok(written)
}
