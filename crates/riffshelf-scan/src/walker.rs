//! Depth-bounded, cancellable directory walker built on jwalk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use jwalk::{Parallelism, WalkDir};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use riffshelf_core::{
    DiscoveredDirectory, DiscoveredFile, PathClassifier, ScanWarning, WalkConfig, WalkStats,
    WarningKind, is_excluded,
};

use crate::inode::VisitedDirs;
use crate::progress::{PROGRESS_CHANNEL_SIZE, ProgressTracker, ScanProgress};

/// Result of walking one root.
#[derive(Debug, Clone)]
pub struct WalkOutcome {
    /// Root that was walked.
    pub root: PathBuf,
    /// Directories holding at least one candidate file, in visit order.
    pub directories: Vec<DiscoveredDirectory>,
    /// Counters for the walk.
    pub stats: WalkStats,
    /// Non-fatal problems encountered.
    pub warnings: Vec<ScanWarning>,
    /// Whether the walk stopped early because of cancellation.
    pub cancelled: bool,
}

impl WalkOutcome {
    fn empty(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            directories: Vec::new(),
            stats: WalkStats::new(),
            warnings: Vec::new(),
            cancelled: false,
        }
    }

    /// Number of candidate files found.
    pub fn file_count(&self) -> u64 {
        self.stats.total_files
    }

    /// Absolute paths of every candidate file found.
    pub fn file_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.directories.iter().flat_map(|d| d.file_paths())
    }
}

/// Walks a root depth-first and groups candidate files by directory.
///
/// Noise directories and excluded paths are pruned before they are read.
/// Unreadable directories and entries are recorded as warnings and skipped.
pub struct DirectoryWalker {
    classifier: Arc<PathClassifier>,
    config: WalkConfig,
    cancel: CancellationToken,
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl DirectoryWalker {
    /// Create a new walker.
    pub fn new(classifier: PathClassifier, config: WalkConfig) -> Self {
        let (progress_tx, _) = broadcast::channel(PROGRESS_CHANNEL_SIZE);
        Self {
            classifier: Arc::new(classifier),
            config,
            cancel: CancellationToken::new(),
            progress_tx,
        }
    }

    /// Share a cancellation token with the walker.
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Publish progress on an existing channel.
    pub fn with_progress_sender(mut self, tx: broadcast::Sender<ScanProgress>) -> Self {
        self.progress_tx = tx;
        self
    }

    /// Subscribe to per-directory progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// The walker's cancellation token.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The walk configuration.
    pub fn config(&self) -> &WalkConfig {
        &self.config
    }

    /// The classifier used for entries.
    pub fn classifier(&self) -> &PathClassifier {
        &self.classifier
    }

    /// Copy of this walker with a different depth bound, sharing the
    /// cancellation token and progress channel.
    pub fn with_max_depth(&self, max_depth: usize) -> Self {
        Self {
            classifier: Arc::clone(&self.classifier),
            config: self.config.with_max_depth(max_depth),
            cancel: self.cancel.clone(),
            progress_tx: self.progress_tx.clone(),
        }
    }

    /// Walk `root` and collect music-bearing directories.
    ///
    /// Never fails: an unreadable root yields an empty outcome with a warning,
    /// and cancellation returns whatever was collected so far.
    pub fn walk(&self, root: &Path) -> WalkOutcome {
        let mut outcome = WalkOutcome::empty(root);

        if self.cancel.is_cancelled() {
            outcome.cancelled = true;
            return outcome;
        }

        let root_metadata = match std::fs::metadata(root) {
            Ok(m) => m,
            Err(err) => {
                warn!(path = %root.display(), error = %err, "Cannot read scan root");
                outcome.warnings.push(ScanWarning::read_error(root, &err));
                return outcome;
            }
        };
        if !root_metadata.is_dir() {
            warn!(path = %root.display(), "Scan root is not a directory");
            outcome.warnings.push(ScanWarning::new(
                root,
                "Not a directory",
                WarningKind::ReadError,
            ));
            return outcome;
        }

        let visited = Arc::new(VisitedDirs::new());

        let mut tracker = ProgressTracker::new(root.to_path_buf());
        let mut by_dir: IndexMap<PathBuf, Vec<DiscoveredFile>> = IndexMap::new();

        for entry_result in self.build_walker(root, visited) {
            if self.cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }

            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    let path = err
                        .path()
                        .map(|p| p.to_path_buf())
                        .unwrap_or_else(|| root.to_path_buf());
                    warn!(path = %path.display(), error = %err, "Skipping unreadable entry");
                    tracker.record_error();
                    outcome
                        .warnings
                        .push(ScanWarning::new(path, err.to_string(), WarningKind::ReadError));
                    continue;
                }
            };

            let depth = entry.depth();
            let file_type = entry.file_type();

            if file_type.is_dir() {
                if depth <= self.config.max_depth && entry.read_children_path.is_some() {
                    outcome.stats.record_dir(depth as u32);
                    tracker.record_dir(entry.path(), &self.progress_tx);
                }
                continue;
            }

            if depth == 0 {
                continue;
            }

            let name = entry.file_name().to_string_lossy().to_string();
            if !self.classifier.is_candidate_file(&name) {
                continue;
            }

            let path = entry.path();
            if is_excluded(&path, &self.config.excluded_paths) {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "Skipping file without metadata");
                    tracker.record_error();
                    outcome
                        .warnings
                        .push(ScanWarning::metadata_error(&path, &err));
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }

            let size = metadata.len();
            let modified = metadata.modified().unwrap_or(std::time::UNIX_EPOCH);
            tracker.record_file(size);
            outcome.stats.record_file(path.clone(), size);

            let Some(parent) = path.parent().map(Path::to_path_buf) else {
                continue;
            };
            by_dir
                .entry(parent)
                .or_default()
                .push(DiscoveredFile::new(name, path, size, modified));
        }

        outcome.directories = by_dir
            .into_iter()
            .filter_map(|(path, files)| DiscoveredDirectory::from_files(path, files))
            .collect();

        debug!(
            root = %root.display(),
            directories = outcome.directories.len(),
            files = outcome.stats.total_files,
            dirs_visited = outcome.stats.dirs_visited,
            warnings = outcome.warnings.len(),
            cancelled = outcome.cancelled,
            "Walk finished"
        );

        outcome
    }

    /// Configure jwalk for a serial, depth-first walk with pruning.
    fn build_walker(&self, root: &Path, visited: Arc<VisitedDirs>) -> WalkDir {
        let classifier = Arc::clone(&self.classifier);
        let excluded = self.config.excluded_paths.clone();
        let cancel = self.cancel.clone();
        let follow_links = self.config.follow_links;

        // Files of a directory at `max_depth` sit one level deeper.
        WalkDir::new(root)
            .parallelism(Parallelism::Serial)
            .skip_hidden(false)
            .follow_links(follow_links)
            .min_depth(0)
            .max_depth(self.config.max_depth.saturating_add(1))
            .process_read_dir(move |_depth, _dir_path, _state, children| {
                if cancel.is_cancelled() {
                    children.clear();
                    return;
                }

                // The root itself passes through here at depth 0; only its
                // descendants are subject to the noise rule.
                children.retain(|result| match result {
                    Ok(entry) if entry.file_type().is_dir() => {
                        let name = entry.file_name().to_string_lossy();
                        let noise = entry.depth() > 0 && classifier.is_noise_directory(&name);
                        !noise && !is_excluded(&entry.path(), &excluded)
                    }
                    _ => true,
                });

                if follow_links {
                    for entry in children.iter_mut().flatten() {
                        if !entry.file_type().is_dir() || entry.read_children_path.is_none() {
                            continue;
                        }
                        let first_visit = entry
                            .metadata()
                            .map(|m| visited.track_metadata(&m))
                            .unwrap_or(true);
                        if !first_visit {
                            entry.read_children_path = None;
                        }
                    }
                }
            })
    }
}
