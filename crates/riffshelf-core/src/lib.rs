//! Core types and classification for riffshelf.
//!
//! This crate provides the data structures shared by the discovery, catalog
//! and library crates: discovered files and directories, scan roots,
//! name-based classification, configuration and error types.

mod classify;
mod config;
mod error;
mod model;
mod stats;

pub use classify::{
    DEFAULT_EXTENSIONS, DEFAULT_MUSIC_KEYWORDS, DEFAULT_NOISE_DIRECTORIES, MusicKeywords,
    PathClassifier, is_excluded,
};
pub use config::{
    DEFAULT_MAX_DEPTH, DEFAULT_MAX_NEW_FILES, LibraryConfig, WalkConfig, WalkConfigBuilder,
};
pub use error::{ConfigError, DiagnosticContext, ScanError, ScanWarning, WarningKind};
pub use model::{
    DiscoveredDirectory, DiscoveredFile, RootOrigin, ScanRoot, Suggestion, SuggestionReason,
};
pub use stats::WalkStats;
