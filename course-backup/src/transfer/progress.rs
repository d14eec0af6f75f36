//! Run-level progress tallies and human-readable formatting.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Per-run course counters, shared between concurrently finishing jobs.
#[derive(Debug, Default)]
pub struct RunProgress {
    total: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    bytes: AtomicU64,
}

/// Point-in-time copy of [`RunProgress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub bytes: u64,
}

impl ProgressSnapshot {
    /// Courses that reached a terminal state.
    pub fn finished(&self) -> usize {
        self.completed + self.failed
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.finished() as f64 / self.total as f64) * 100.0
        }
    }
}

impl RunProgress {
    /// Reset the counters for a run of `total` courses.
    pub fn start(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
        self.completed.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.bytes.store(0, Ordering::Relaxed);
    }

    pub fn record_completed(&self, bytes: u64) -> ProgressSnapshot {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
        self.snapshot()
    }

    pub fn record_failed(&self) -> ProgressSnapshot {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.snapshot()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
        }
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Format duration as human-readable string
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}
