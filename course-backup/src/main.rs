//! Course Backup - Main entry point

use anyhow::{Context, Result};
use clap::Parser;
use course_backup::canvas::CanvasClient;
use course_backup::config::Config;
use course_backup::courses::load_courses;
use course_backup::daemon::{BackupScheduler, ScheduledRun, ShutdownCoordinator};
use course_backup::executor::BackupSession;
use course_backup::report::TracingReporter;
use course_backup::utils;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Course list CSV (overrides config)
    #[arg(long, value_name = "FILE")]
    courses: Option<PathBuf>,

    /// Directory that holds the backup root (overrides config)
    #[arg(short, long, value_name = "DIR")]
    destination: Option<PathBuf>,

    /// Number of version directories to keep (overrides config)
    #[arg(long)]
    versions: Option<usize>,

    /// LMS tenant subdomain (overrides config)
    #[arg(long)]
    domain: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Run a single backup and exit, even if a schedule is configured
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };
    config.apply_env();

    if let Some(courses) = args.courses {
        config.backup.course_list = courses;
    }
    if let Some(destination) = args.destination {
        config.backup.destination_path = destination;
    }
    if let Some(versions) = args.versions {
        config.backup.versions_to_keep = versions;
    }
    if let Some(domain) = args.domain {
        config.canvas.domain = domain;
    }

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    config.validate()?;

    tracing::info!(
        "Starting course-backup v{} (domain: {})",
        env!("CARGO_PKG_VERSION"),
        config.canvas.domain
    );
    if config.canvas.token.is_empty() {
        tracing::warn!("No API token configured; set {}", course_backup::config::TOKEN_ENV);
    }

    let client = CanvasClient::new(&config.canvas, &config.export)?;
    let session = Arc::new(BackupSession::new(
        config.run_config(),
        config.export_settings(),
        Arc::new(client),
        Arc::new(TracingReporter::new()),
    ));

    let cron = config.schedule.cron.clone().filter(|_| !args.once);
    let Some(cron) = cron else {
        let courses = load_courses(&config.backup.course_list)
            .with_context(|| format!("loading {}", config.backup.course_list.display()))?;
        let summary = session.run(&courses).await?;
        if !summary.is_clean() {
            tracing::warn!("{} of {} courses failed", summary.failed.len(), courses.len());
        }
        return Ok(());
    };

    // Fail fast on a bad course list before waiting for the first tick
    load_courses(&config.backup.course_list)
        .with_context(|| format!("loading {}", config.backup.course_list.display()))?;

    let scheduler = BackupScheduler::new(ScheduledRun::new(session, config.backup.course_list.clone())).await?;
    scheduler.schedule(&cron).await?;

    // Create shutdown coordinator; the scheduler listens for its signal
    let shutdown_coordinator = ShutdownCoordinator::new();
    let shutdown = shutdown_coordinator.subscribe();
    let signal_handle = tokio::spawn(async move {
        shutdown_coordinator.wait_for_signal().await;
    });

    scheduler.run_until(shutdown).await?;
    signal_handle.abort();
    tracing::info!("Shutdown complete");

    Ok(())
}
