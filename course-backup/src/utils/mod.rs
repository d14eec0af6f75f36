//! Utility modules for the course backup tool.

pub mod errors;
pub mod logger;

pub use errors::{BackupError, Result};
