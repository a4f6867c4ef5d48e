//! Transfer progress tracking
//!
//! Lock-free counters shared by every upload task, with snapshots for
//! display layers. The library only counts; rendering lives in the CLI.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Progress counters for one transfer run
pub struct TransferProgress {
    /// Bytes written to the remote store
    bytes: AtomicU64,
    /// Objects fully submitted (files)
    files: AtomicU64,
    /// Collections created
    collections: AtomicU64,
    /// Start time, set by `set_totals`
    start: RwLock<Option<Instant>>,
    /// Total bytes expected
    total_bytes: AtomicU64,
    /// Total files expected
    total_files: AtomicU64,
}

impl TransferProgress {
    /// Create a progress tracker with all counters at zero
    pub fn new() -> Self {
        Self {
            bytes: AtomicU64::new(0),
            files: AtomicU64::new(0),
            collections: AtomicU64::new(0),
            start: RwLock::new(None),
            total_bytes: AtomicU64::new(0),
            total_files: AtomicU64::new(0),
        }
    }

    /// Set expected totals and start the clock
    pub fn set_totals(&self, files: u64, bytes: u64) {
        self.total_files.store(files, Ordering::SeqCst);
        self.total_bytes.store(bytes, Ordering::SeqCst);
        *self.start.write().unwrap() = Some(Instant::now());
    }

    /// Add transferred bytes
    pub fn add_bytes(&self, bytes: u64) {
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record one file fully handled
    pub fn add_file(&self) {
        self.files.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one collection created
    pub fn add_collection(&self) {
        self.collections.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a consistent-enough view of the counters
    pub fn snapshot(&self) -> ProgressSnapshot {
        let bytes = self.bytes.load(Ordering::Relaxed);
        let files = self.files.load(Ordering::Relaxed);
        let collections = self.collections.load(Ordering::Relaxed);
        let total_bytes = self.total_bytes.load(Ordering::Relaxed);
        let total_files = self.total_files.load(Ordering::Relaxed);

        let elapsed = self
            .start
            .read()
            .unwrap()
            .map(|s| s.elapsed())
            .unwrap_or(Duration::ZERO);

        let throughput = if elapsed.as_secs_f64() > 0.0 {
            bytes as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        let percent = if total_bytes > 0 {
            (bytes as f64 / total_bytes as f64) * 100.0
        } else {
            0.0
        };

        let eta = if throughput > 0.0 && bytes < total_bytes {
            Some(Duration::from_secs_f64(
                (total_bytes - bytes) as f64 / throughput,
            ))
        } else {
            None
        };

        ProgressSnapshot {
            bytes,
            files,
            collections,
            total_bytes,
            total_files,
            elapsed,
            throughput,
            percent,
            eta,
        }
    }
}

impl Default for TransferProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of a transfer run
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    /// Bytes written so far
    pub bytes: u64,
    /// Files handled so far
    pub files: u64,
    /// Collections created so far
    pub collections: u64,
    /// Expected total bytes
    pub total_bytes: u64,
    /// Expected total files
    pub total_files: u64,
    /// Time since `set_totals`
    pub elapsed: Duration,
    /// Bytes per second since the start
    pub throughput: f64,
    /// Percent of expected bytes written
    pub percent: f64,
    /// Estimated time remaining, when computable
    pub eta: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_tracking() {
        let progress = TransferProgress::new();
        progress.set_totals(100, 1000);

        progress.add_bytes(500);
        progress.add_file();
        progress.add_collection();

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.bytes, 500);
        assert_eq!(snapshot.files, 1);
        assert_eq!(snapshot.collections, 1);
        assert_eq!(snapshot.total_bytes, 1000);
        assert_eq!(snapshot.total_files, 100);
        assert_eq!(snapshot.percent, 50.0);
    }

    #[test]
    fn test_snapshot_without_totals() {
        let progress = TransferProgress::new();
        progress.add_bytes(10);

        let snapshot = progress.snapshot();
        assert_eq!(snapshot.percent, 0.0);
        assert_eq!(snapshot.elapsed, Duration::ZERO);
        assert!(snapshot.eta.is_none());
    }
}
