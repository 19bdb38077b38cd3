//! Walk progress reporting.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

/// Default capacity of progress broadcast channels.
pub const PROGRESS_CHANNEL_SIZE: usize = 256;

/// Progress information published once per directory visited.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    /// Root the current walk started from.
    pub root: PathBuf,
    /// Directory just visited.
    pub current_path: PathBuf,
    /// Directories visited so far in this walk.
    pub dirs_scanned: u64,
    /// Candidate files found so far in this walk.
    pub files_found: u64,
    /// Bytes across candidate files found so far.
    pub bytes_found: u64,
    /// Number of warnings encountered.
    pub errors_count: u64,
    /// Time elapsed since the walk started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Calculate the walk rate in directories per second.
    pub fn dirs_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.dirs_scanned as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }
}

/// Internal progress tracker with timing.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    start_time: Instant,
    root: PathBuf,
    dirs_scanned: u64,
    files_found: u64,
    bytes_found: u64,
    errors_count: u64,
}

impl ProgressTracker {
    pub fn new(root: PathBuf) -> Self {
        Self {
            start_time: Instant::now(),
            root,
            dirs_scanned: 0,
            files_found: 0,
            bytes_found: 0,
            errors_count: 0,
        }
    }

    pub fn record_file(&mut self, size: u64) {
        self.files_found += 1;
        self.bytes_found += size;
    }

    pub fn record_error(&mut self) {
        self.errors_count += 1;
    }

    /// Count a visited directory and publish a snapshot.
    ///
    /// Sending never blocks; with no subscribers the update is dropped.
    pub fn record_dir(&mut self, path: PathBuf, tx: &broadcast::Sender<ScanProgress>) {
        self.dirs_scanned += 1;
        let _ = tx.send(self.snapshot(path));
    }

    pub fn snapshot(&self, current_path: PathBuf) -> ScanProgress {
        ScanProgress {
            root: self.root.clone(),
            current_path,
            dirs_scanned: self.dirs_scanned,
            files_found: self.files_found,
            bytes_found: self.bytes_found,
            errors_count: self.errors_count,
            elapsed: self.start_time.elapsed(),
        }
    }
}
