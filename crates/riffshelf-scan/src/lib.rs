//! Directory walking and music discovery for riffshelf.
//!
//! This crate finds the directories that hold music files, using jwalk for
//! traversal.
//!
//! # Overview
//!
//! - [`DirectoryWalker`] walks one root depth-first, skipping noise
//!   directories and excluded paths, and groups candidate files by directory.
//! - [`DiscoveryPlanner`] composes configured roots, standard platform
//!   locations and a keyword search of broad locations into a
//!   [`DiscoveryReport`] with ranked suggestions.
//! - [`BusyGuard`] keeps one run in flight per planner or session.
//!
//! # Example
//!
//! ```rust,no_run
//! use riffshelf_scan::{DirectoryWalker, PathClassifier, WalkConfig};
//!
//! let walker = DirectoryWalker::new(PathClassifier::default(), WalkConfig::default());
//! let outcome = walker.walk(std::path::Path::new("/path/to/music"));
//!
//! println!("Directories: {}", outcome.directories.len());
//! println!("Files: {}", outcome.file_count());
//! ```
//!
//! # Progress Monitoring
//!
//! ```rust,no_run
//! use riffshelf_scan::{DirectoryWalker, PathClassifier, WalkConfig};
//!
//! let walker = DirectoryWalker::new(PathClassifier::default(), WalkConfig::default());
//! let mut progress_rx = walker.subscribe();
//!
//! tokio::spawn(async move {
//!     while let Ok(progress) = progress_rx.recv().await {
//!         println!("Visited {} directories", progress.dirs_scanned);
//!     }
//! });
//! ```

mod guard;
mod inode;
mod locations;
mod planner;
mod progress;
mod walker;

pub use guard::BusyGuard;
pub use inode::{DirIdentity, VisitedDirs};
pub use locations::{LocationProvider, StaticLocations, SystemLocations};
pub use planner::{
    DiscoveryPlanner, DiscoveryReport, DiscoverySummary, PlannerConfig, PlannerConfigBuilder,
};
pub use progress::{PROGRESS_CHANNEL_SIZE, ScanProgress};
pub use walker::{DirectoryWalker, WalkOutcome};

// Re-export core types for convenience
pub use riffshelf_core::{
    DiagnosticContext, DiscoveredDirectory, DiscoveredFile, MusicKeywords, PathClassifier,
    RootOrigin, ScanError, ScanRoot, ScanWarning, Suggestion, SuggestionReason, WalkConfig,
    WalkStats, WarningKind,
};
