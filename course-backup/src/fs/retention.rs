//! Version-count retention for the backup root.
//!
//! Every directory directly beneath the root is one version. Versions are
//! ordered by creation time (name breaks ties) and deleted oldest first
//! until no more than `limit` remain.

use crate::utils::errors::{BackupError, Result};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};
use walkdir::WalkDir;

/// One version directory under the backup root.
#[derive(Debug, Clone)]
pub struct VersionDir {
    pub name: String,
    pub path: PathBuf,
    pub created_at: SystemTime,
}

/// Outcome of one deletion attempt.
#[derive(Debug, Clone)]
pub struct Deletion {
    pub name: String,
    pub error: Option<String>,
}

impl Deletion {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetentionReport {
    /// Deletion attempts in the order they were made (oldest first)
    pub deletions: Vec<Deletion>,
    /// Version directories left after the pass
    pub remaining: usize,
}

impl RetentionReport {
    pub fn deleted_count(&self) -> usize {
        self.deletions.iter().filter(|d| d.succeeded()).count()
    }
}

type Remover = fn(&Path) -> std::io::Result<()>;

pub struct RetentionManager {
    root: PathBuf,
    limit: usize,
    remover: Remover,
}

impl RetentionManager {
    pub fn new(root: impl Into<PathBuf>, limit: usize) -> Self {
        Self {
            root: root.into(),
            limit,
            remover: |path| std::fs::remove_dir_all(path),
        }
    }

    #[cfg(test)]
    fn with_remover(mut self, remover: Remover) -> Self {
        self.remover = remover;
        self
    }

    /// Version directories sorted oldest first. A missing root has none.
    pub fn list_versions(&self) -> Result<Vec<VersionDir>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut versions = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&self.root).to_path_buf();
                BackupError::fs(path, e.into())
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }

            let metadata = entry
                .metadata()
                .map_err(|e| BackupError::fs(entry.path(), e.into()))?;
            let created_at = metadata
                .created()
                .or_else(|_| metadata.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);

            versions.push(VersionDir {
                name: entry.file_name().to_string_lossy().to_string(),
                path: entry.path().to_path_buf(),
                created_at,
            });
        }

        versions.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(versions)
    }

    /// Delete the oldest versions until at most `limit` remain.
    ///
    /// A failed deletion is recorded and skipped; the pass continues with the
    /// next-oldest candidate. The count is re-read after every attempt.
    pub fn enforce(&self) -> Result<RetentionReport> {
        let candidates = self.list_versions()?;
        let mut count = candidates.len();
        let mut report = RetentionReport::default();

        for candidate in candidates {
            if count <= self.limit {
                break;
            }

            match (self.remover)(&candidate.path) {
                Ok(()) => {
                    info!(version = %candidate.name, "Deleted old version directory");
                    report.deletions.push(Deletion {
                        name: candidate.name.clone(),
                        error: None,
                    });
                }
                Err(e) => {
                    warn!(version = %candidate.name, error = %e, "Failed to delete version directory");
                    report.deletions.push(Deletion {
                        name: candidate.name.clone(),
                        error: Some(e.to_string()),
                    });
                }
            }

            count = match self.list_versions() {
                Ok(versions) => versions.len(),
                Err(e) => {
                    warn!(error = %e, "Failed to recount version directories");
                    count - usize::from(report.deletions.last().is_some_and(|d| d.succeeded()))
                }
            };
        }

        report.remaining = count;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Create version directories in the given order, oldest first.
    fn make_versions(root: &Path, names: &[&str]) {
        for name in names {
            fs::create_dir(root.join(name)).unwrap();
            fs::write(root.join(name).join("course.imscc"), b"data").unwrap();
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    fn remaining_names(root: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(root)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_missing_root_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let manager = RetentionManager::new(dir.path().join("absent"), 1);
        let report = manager.enforce().unwrap();
        assert!(report.deletions.is_empty());
        assert_eq!(report.remaining, 0);
    }

    #[test]
    fn test_at_or_below_limit_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        make_versions(dir.path(), &["v1", "v2"]);

        for limit in [2, 3] {
            let report = RetentionManager::new(dir.path(), limit).enforce().unwrap();
            assert!(report.deletions.is_empty());
            assert_eq!(report.remaining, 2);
        }
    }

    #[test]
    fn test_deletes_oldest_prefix() {
        let dir = TempDir::new().unwrap();
        make_versions(dir.path(), &["v1", "v2", "v3", "v4", "v5"]);

        let report = RetentionManager::new(dir.path(), 2).enforce().unwrap();

        let deleted: Vec<&str> = report.deletions.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(deleted, vec!["v1", "v2", "v3"]);
        assert_eq!(report.remaining, 2);
        assert_eq!(remaining_names(dir.path()), vec!["v4", "v5"]);
    }

    #[test]
    fn test_limit_of_one_keeps_newest() {
        let dir = TempDir::new().unwrap();
        make_versions(dir.path(), &["a", "b", "c"]);

        let report = RetentionManager::new(dir.path(), 1).enforce().unwrap();
        assert_eq!(report.deleted_count(), 2);
        assert_eq!(remaining_names(dir.path()), vec!["c"]);
    }

    #[test]
    fn test_plain_files_are_not_versions() {
        let dir = TempDir::new().unwrap();
        make_versions(dir.path(), &["v1", "v2"]);
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let versions = RetentionManager::new(dir.path(), 1).list_versions().unwrap();
        assert_eq!(versions.len(), 2);
    }

    #[test]
    fn test_ordering_uses_creation_time_not_name() {
        let dir = TempDir::new().unwrap();
        make_versions(dir.path(), &["zzz-oldest", "aaa-newest"]);

        RetentionManager::new(dir.path(), 1).enforce().unwrap();
        assert_eq!(remaining_names(dir.path()), vec!["aaa-newest"]);
    }

    #[test]
    fn test_failed_deletion_is_skipped_and_pass_continues() {
        let dir = TempDir::new().unwrap();
        make_versions(dir.path(), &["locked", "v2", "v3", "v4"]);

        fn remover(path: &Path) -> std::io::Result<()> {
            if path.ends_with("locked") {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "locked",
                ));
            }
            fs::remove_dir_all(path)
        }

        let report = RetentionManager::new(dir.path(), 2)
            .with_remover(remover)
            .enforce()
            .unwrap();

        assert_eq!(report.deletions.len(), 3);
        assert!(!report.deletions[0].succeeded());
        assert_eq!(report.deleted_count(), 2);
        assert_eq!(report.remaining, 2);
        assert_eq!(remaining_names(dir.path()), vec!["locked", "v4"]);
    }
}
