//! Collision-free artifact naming.
//!
//! File names have the shape `<course name>_ID<id>_<version>.<ext>`. The
//! whole name is capped at [`MAX_FILE_NAME_LEN`] characters; only the course
//! name is ever shortened. When the name is taken, ` (1)`, ` (2)`, ... is
//! inserted before the extension.

use crate::courses::Course;
use crate::utils::errors::{BackupError, Result};
use dashmap::DashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Upper bound on the characters of an artifact file name.
pub const MAX_FILE_NAME_LEN: usize = 100;

const MAX_DISAMBIGUATOR: u32 = 9999;
const FALLBACK_NAME: &str = "course";

/// Builds artifact paths and reserves them on disk.
///
/// Reservations in the same directory are serialized by a per-directory
/// lock, so two jobs can never be handed the same path.
pub struct NameResolver {
    extension: String,
    dir_locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl NameResolver {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into().trim_start_matches('.').to_string(),
            dir_locks: DashMap::new(),
        }
    }

    /// File name for `course` in `version`, with an optional disambiguator.
    pub fn file_name(&self, course: &Course, version: &str, disambiguator: Option<u32>) -> Result<String> {
        let suffix = disambiguator.map(|n| format!(" ({})", n)).unwrap_or_default();
        let tail = format!(
            "_ID{}_{}{}.{}",
            sanitize(&course.id),
            sanitize(version),
            suffix,
            self.extension
        );

        let tail_len = tail.chars().count();
        if tail_len > MAX_FILE_NAME_LEN {
            return Err(BackupError::InvalidName(format!(
                "id and version of course {} alone exceed {} characters",
                course.id, MAX_FILE_NAME_LEN
            )));
        }

        let mut name = sanitize(&course.name);
        if name.is_empty() {
            name = FALLBACK_NAME.to_string();
        }
        let budget = MAX_FILE_NAME_LEN - tail_len;
        let name: String = name.chars().take(budget).collect();
        let name = name.trim_end_matches(['.', ' ']);

        Ok(format!("{}{}", name, tail))
    }

    /// First free path for `course` in `dir`, judged by what exists right now.
    ///
    /// Repeated calls against an unchanged directory return the same path.
    pub fn resolve(&self, course: &Course, version: &str, dir: &Path) -> Result<PathBuf> {
        for n in std::iter::once(None).chain((1..=MAX_DISAMBIGUATOR).map(Some)) {
            let path = dir.join(self.file_name(course, version, n)?);
            if !path.exists() {
                return Ok(path);
            }
        }
        Err(exhausted(course))
    }

    /// Resolve and atomically create the artifact file.
    ///
    /// The file is opened with create-new semantics while the directory
    /// lock is held, so a path that appeared concurrently is skipped rather
    /// than overwritten.
    pub fn reserve(&self, course: &Course, version: &str, dir: &Path) -> Result<(PathBuf, File)> {
        let lock = self
            .dir_locks
            .entry(dir.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        for n in std::iter::once(None).chain((1..=MAX_DISAMBIGUATOR).map(Some)) {
            let path = dir.join(self.file_name(course, version, n)?);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(BackupError::fs(path, e)),
            }
        }
        Err(exhausted(course))
    }
}

fn exhausted(course: &Course) -> BackupError {
    BackupError::InvalidName(format!(
        "no free file name for course {} after {} attempts",
        course.id, MAX_DISAMBIGUATOR
    ))
}

/// Replace characters that are illegal in file names on common platforms.
pub fn sanitize(raw: &str) -> String {
    let replaced: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    replaced.trim_end_matches(['.', ' ']).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const VERSION: &str = "2026Y-10M-17D 14h05m";

    fn resolver() -> NameResolver {
        NameResolver::new("imscc")
    }

    #[test]
    fn test_file_name_shape() {
        let name = resolver()
            .file_name(&Course::new("101", "Biology 101"), VERSION, None)
            .unwrap();
        assert_eq!(name, "Biology 101_ID101_2026Y-10M-17D 14h05m.imscc");
    }

    #[test]
    fn test_sanitize_replaces_illegal_characters() {
        assert_eq!(sanitize("A/B\\C:D*E?F\"G<H>I|J"), "A_B_C_D_E_F_G_H_I_J");
        assert_eq!(sanitize("tab\there"), "tab_here");
        assert_eq!(sanitize("  Trailing dots... "), "Trailing dots");
    }

    #[test]
    fn test_empty_name_falls_back() {
        let name = resolver()
            .file_name(&Course::new("5", "???"), VERSION, None)
            .unwrap();
        assert!(name.starts_with("____ID5_"));

        let name = resolver().file_name(&Course::new("5", "  "), VERSION, None).unwrap();
        assert!(name.starts_with("course_ID5_"));
    }

    #[test]
    fn test_long_name_is_truncated_but_id_and_version_survive() {
        let course = Course::new("987654", "x".repeat(150));
        let name = resolver().file_name(&course, VERSION, None).unwrap();

        assert!(name.chars().count() <= MAX_FILE_NAME_LEN);
        assert!(name.ends_with("_ID987654_2026Y-10M-17D 14h05m.imscc"));

        let with_suffix = resolver().file_name(&course, VERSION, Some(12)).unwrap();
        assert!(with_suffix.chars().count() <= MAX_FILE_NAME_LEN);
        assert!(with_suffix.ends_with("_ID987654_2026Y-10M-17D 14h05m (12).imscc"));
    }

    #[test]
    fn test_truncation_counts_characters_not_bytes() {
        let course = Course::new("1", "é".repeat(150));
        let name = resolver().file_name(&course, VERSION, None).unwrap();
        assert_eq!(name.chars().count(), MAX_FILE_NAME_LEN);
    }

    #[test]
    fn test_oversized_id_is_rejected() {
        let course = Course::new("9".repeat(120), "Art");
        let err = resolver().file_name(&course, VERSION, None).unwrap_err();
        assert!(matches!(err, BackupError::InvalidName(_)));
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let course = Course::new("1", "Art");
        let first = resolver().resolve(&course, VERSION, dir.path()).unwrap();
        let second = resolver().resolve(&course, VERSION, dir.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_resolve_skips_existing_files() {
        let dir = TempDir::new().unwrap();
        let course = Course::new("1", "Art");
        let first = resolver().resolve(&course, VERSION, dir.path()).unwrap();
        std::fs::write(&first, b"taken").unwrap();

        let second = resolver().resolve(&course, VERSION, dir.path()).unwrap();
        assert_ne!(first, second);
        assert!(second
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with(" (1).imscc"));
    }

    #[test]
    fn test_reserve_hands_out_distinct_paths() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver();
        let course_a = Course::new("5", "Bio/101");
        let course_b = Course::new("5", "Bio:101");

        let (a, _) = resolver.reserve(&course_a, VERSION, dir.path()).unwrap();
        let (b, _) = resolver.reserve(&course_b, VERSION, dir.path()).unwrap();

        assert_ne!(a, b);
        assert!(a.exists() && b.exists());
    }

    #[test]
    fn test_reserve_concurrently_never_collides() {
        let dir = TempDir::new().unwrap();
        let resolver = Arc::new(resolver());
        let course = Course::new("5", "Same");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let resolver = resolver.clone();
                let course = course.clone();
                let dir = dir.path().to_path_buf();
                std::thread::spawn(move || resolver.reserve(&course, VERSION, &dir).unwrap().0)
            })
            .collect();

        let mut paths: Vec<PathBuf> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 8);
    }
}
