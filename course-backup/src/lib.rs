//! Course Backup Library
//!
//! Exports LMS courses as archives into dated version directories with
//! bounded concurrency, then prunes the oldest versions.

pub mod canvas;
pub mod config;
pub mod courses;
pub mod daemon;
pub mod executor;
pub mod fs;
pub mod report;
pub mod retry;
pub mod transfer;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use utils::errors::{BackupError, Result};
