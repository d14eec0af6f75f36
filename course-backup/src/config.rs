//! Configuration management for the course backup tool.
//!
//! Loads configuration from a TOML file with environment variable overrides.
//! Every section is optional; missing values fall back to the defaults below.

use crate::executor::{ExportSettings, RunConfig};
use crate::utils::errors::{BackupError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the LMS API token.
pub const TOKEN_ENV: &str = "CANVAS_API_TOKEN";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub canvas: CanvasConfig,
    pub backup: BackupConfig,
    pub export: ExportConfig,
    pub retry: RetryConfig,
    pub schedule: ScheduleConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// Tenant subdomain, e.g. `byui` or `byui.test`
    pub domain: String,

    /// Explicit API base URL (overrides the domain-derived one)
    pub base_url: Option<String>,

    /// Bearer token for the LMS API
    pub token: String,

    /// Timeout for individual API calls (not archive downloads)
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// CSV file listing the courses to back up
    pub course_list: PathBuf,

    /// Parent directory of the backup root
    pub destination_path: PathBuf,

    /// Name of the backup root under `destination_path`
    pub directory_name: String,

    /// Number of version directories to keep
    pub versions_to_keep: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Maximum number of courses exported at the same time
    pub max_concurrent: usize,

    /// Delay between export status checks
    pub poll_interval_ms: u64,

    /// Give up on an export after this many status checks (unset = never)
    pub max_poll_attempts: Option<u32>,

    /// Remote export format
    pub export_type: String,

    /// File extension of downloaded archives
    pub archive_extension: String,

    /// Suppress LMS notifications for export jobs
    pub skip_notifications: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt (0 disables retrying)
    pub max_attempts: u32,

    /// Delay before the first retry
    pub initial_delay_ms: u64,

    /// Upper bound for the backoff delay
    pub max_delay_ms: u64,

    /// Multiplier applied to the delay after each retry
    pub backoff_multiplier: f64,

    /// Add random jitter to delays
    pub jitter: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Six-field cron expression; unset runs a single session
    pub cron: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            domain: "byui".to_string(),
            base_url: None,
            token: String::new(),
            request_timeout_secs: 30,
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            course_list: PathBuf::from("./courses.csv"),
            destination_path: PathBuf::from("."),
            directory_name: "courseBackups".to_string(),
            versions_to_keep: 5,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            poll_interval_ms: 500,
            max_poll_attempts: None,
            export_type: "common_cartridge".to_string(),
            archive_extension: "imscc".to_string(),
            skip_notifications: true,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            initial_delay_ms: 1000,
            max_delay_ms: 60_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl CanvasConfig {
    /// API base URL without a trailing slash.
    pub fn base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}.instructure.com", self.domain),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| BackupError::fs(path, e))?;
        toml::from_str(&content)
            .map_err(|e| BackupError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Apply environment overrides (`.env` is honored).
    pub fn apply_env(&mut self) {
        let _ = dotenvy::dotenv();
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            if !token.is_empty() {
                self.canvas.token = token;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.canvas.domain.trim().is_empty() && self.canvas.base_url.is_none() {
            return Err(BackupError::Config("canvas.domain must not be empty".into()));
        }
        if self.backup.versions_to_keep < 1 {
            return Err(BackupError::Config(
                "backup.versions_to_keep must be at least 1".into(),
            ));
        }
        if self.backup.directory_name.trim().is_empty() {
            return Err(BackupError::Config(
                "backup.directory_name must not be empty".into(),
            ));
        }
        if self.export.max_concurrent < 1 {
            return Err(BackupError::Config(
                "export.max_concurrent must be at least 1".into(),
            ));
        }
        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            return Err(BackupError::Config(
                "retry.backoff_multiplier must be a finite number >= 1.0".into(),
            ));
        }
        if self.export.poll_interval_ms == 0 {
            return Err(BackupError::Config(
                "export.poll_interval_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Directory holding all version directories.
    pub fn destination_root(&self) -> PathBuf {
        self.backup.destination_path.join(&self.backup.directory_name)
    }

    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            domain: self.canvas.domain.clone(),
            destination_root: self.destination_root(),
            version_limit: self.backup.versions_to_keep,
        }
    }

    pub fn export_settings(&self) -> ExportSettings {
        ExportSettings {
            max_concurrent: self.export.max_concurrent,
            poll_interval: Duration::from_millis(self.export.poll_interval_ms),
            max_poll_attempts: self.export.max_poll_attempts,
            archive_extension: self.export.archive_extension.clone(),
            retry: self.retry.clone(),
        }
    }
}
