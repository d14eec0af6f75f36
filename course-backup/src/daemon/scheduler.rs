//! Cron-driven repetition of whole backup runs.

use crate::courses::load_courses;
use crate::executor::{BackupSession, RunSummary};
use crate::utils::errors::{BackupError, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

/// One schedulable backup run. At most one run is in progress at a time.
#[derive(Clone)]
pub struct ScheduledRun {
    session: Arc<BackupSession>,
    course_list: PathBuf,
    running: Arc<Mutex<()>>,
}

impl ScheduledRun {
    pub fn new(session: Arc<BackupSession>, course_list: impl Into<PathBuf>) -> Self {
        Self {
            session,
            course_list: course_list.into(),
            running: Arc::new(Mutex::new(())),
        }
    }

    /// Reload the course list and run a session.
    ///
    /// Returns `Ok(None)` when the previous run has not finished yet.
    pub async fn fire(&self) -> Result<Option<RunSummary>> {
        let Ok(_guard) = self.running.try_lock() else {
            warn!("Skipping scheduled run: previous run still in progress");
            return Ok(None);
        };

        let courses = load_courses(&self.course_list)?;
        let summary = self.session.run(&courses).await?;
        Ok(Some(summary))
    }

    /// Wait for an in-progress run to finish.
    pub async fn wait_idle(&self) {
        let _guard = self.running.lock().await;
    }
}

pub struct BackupScheduler {
    scheduler: Mutex<JobScheduler>,
    run: ScheduledRun,
}

impl BackupScheduler {
    pub async fn new(run: ScheduledRun) -> Result<Self> {
        let scheduler = JobScheduler::new().await.map_err(scheduler_error)?;
        Ok(Self {
            scheduler: Mutex::new(scheduler),
            run,
        })
    }

    /// Register `cron_expression` (six fields, seconds first).
    pub async fn schedule(&self, cron_expression: &str) -> Result<()> {
        let run = self.run.clone();

        let job = Job::new_async(cron_expression, move |_uuid, _lock| {
            let run = run.clone();
            Box::pin(async move {
                match run.fire().await {
                    Ok(Some(summary)) => info!(
                        run_id = %summary.run_id,
                        completed = summary.completed.len(),
                        failed = summary.failed.len(),
                        "Scheduled backup finished"
                    ),
                    Ok(None) => {}
                    Err(e) => error!(error = %e, "Scheduled backup failed"),
                }
            })
        })
        .map_err(scheduler_error)?;

        self.scheduler
            .lock()
            .await
            .add(job)
            .await
            .map_err(scheduler_error)?;
        info!(cron = %cron_expression, "Backup scheduled");
        Ok(())
    }

    pub async fn start(&self) -> Result<()> {
        self.scheduler
            .lock()
            .await
            .start()
            .await
            .map_err(scheduler_error)
    }

    /// Start firing and keep going until `shutdown` fires (or its sender
    /// is dropped), then shut down.
    pub async fn run_until(&self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        self.start().await?;
        let _ = shutdown.recv().await;
        info!("Shutdown requested, stopping the scheduler");
        self.shutdown().await
    }

    /// Stop firing new runs and wait for the current one to finish.
    pub async fn shutdown(&self) -> Result<()> {
        self.scheduler
            .lock()
            .await
            .shutdown()
            .await
            .map_err(scheduler_error)?;
        self.run.wait_idle().await;
        Ok(())
    }
}

fn scheduler_error(e: impl std::fmt::Display) -> BackupError {
    BackupError::Scheduler(e.to_string())
}
