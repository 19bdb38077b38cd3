//! Discovery data model: roots, directories and files.

use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// How a scan root entered the search space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RootOrigin {
    /// Explicitly configured by the user.
    Configured,
    /// An OS-conventional location such as Music or Downloads.
    Standard,
    /// Found by the keyword heuristic.
    Discovered,
    /// Offered to the user as a suggestion.
    Suggested,
}

impl fmt::Display for RootOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configured => write!(f, "configured"),
            Self::Standard => write!(f, "standard"),
            Self::Discovered => write!(f, "discovered"),
            Self::Suggested => write!(f, "suggested"),
        }
    }
}

/// A filesystem path used as a place to search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRoot {
    /// Directory to search.
    pub path: PathBuf,
    /// Where the root came from.
    pub origin: RootOrigin,
}

impl ScanRoot {
    /// Create a new scan root.
    pub fn new(path: impl Into<PathBuf>, origin: RootOrigin) -> Self {
        Self {
            path: path.into(),
            origin,
        }
    }
}

/// A single candidate audio file.
///
/// Identity is the absolute path; it is the key used against the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredFile {
    /// File name (not full path).
    pub name: CompactString,
    /// Absolute path.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: SystemTime,
}

impl DiscoveredFile {
    /// Create a new discovered file.
    pub fn new(
        name: impl Into<CompactString>,
        path: impl Into<PathBuf>,
        size: u64,
        modified: SystemTime,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            size,
            modified,
        }
    }
}

/// A directory holding at least one candidate file.
///
/// Only the directory's own files are listed; subdirectories with matches get
/// their own record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredDirectory {
    /// Absolute directory path.
    pub path: PathBuf,
    /// Display name (last path component).
    pub name: CompactString,
    /// Candidate files directly inside this directory.
    pub files: Vec<DiscoveredFile>,
    /// Number of files, always `files.len()`.
    pub file_count: u64,
    /// Sum of file sizes in bytes.
    pub total_size: u64,
    /// When the directory was discovered.
    pub discovered_at: DateTime<Utc>,
}

impl DiscoveredDirectory {
    /// Build a directory record from its files.
    ///
    /// Returns `None` when `files` is empty; empty directories are never
    /// materialized.
    pub fn from_files(path: impl Into<PathBuf>, files: Vec<DiscoveredFile>) -> Option<Self> {
        if files.is_empty() {
            return None;
        }

        let path = path.into();
        let name = path
            .file_name()
            .map(|n| CompactString::new(n.to_string_lossy()))
            .unwrap_or_else(|| CompactString::new(path.to_string_lossy()));
        let total_size = files.iter().map(|f| f.size).sum();

        Some(Self {
            file_count: files.len() as u64,
            path,
            name,
            files,
            total_size,
            discovered_at: Utc::now(),
        })
    }

    /// Iterate over the absolute paths of this directory's files.
    pub fn file_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.files.iter().map(|f| &f.path)
    }
}

/// Why a directory was suggested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionReason {
    /// A recently used location that already holds audio files.
    RecentActivity,
    /// A music-named directory that holds no audio files yet.
    MusicKeyword,
}

impl SuggestionReason {
    /// Confidence assigned to suggestions of this kind.
    pub fn confidence(self) -> f32 {
        match self {
            Self::RecentActivity => 0.8,
            Self::MusicKeyword => 0.6,
        }
    }
}

/// A directory the user may want to add to the enabled paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Suggested directory.
    pub path: PathBuf,
    /// Why it was suggested.
    pub reason: SuggestionReason,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    /// Candidate files found in it.
    pub file_count: u64,
}

impl Suggestion {
    /// Create a suggestion with the confidence implied by its reason.
    pub fn new(path: impl Into<PathBuf>, reason: SuggestionReason, file_count: u64) -> Self {
        Self {
            path: path.into(),
            reason,
            confidence: reason.confidence(),
            file_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, size: u64) -> DiscoveredFile {
        DiscoveredFile::new(name, format!("/music/{name}"), size, SystemTime::now())
    }

    #[test]
    fn test_directory_from_files() {
        let dir = DiscoveredDirectory::from_files(
            "/music",
            vec![file("a.mp3", 100), file("b.flac", 250)],
        )
        .unwrap();

        assert_eq!(dir.name.as_str(), "music");
        assert_eq!(dir.file_count, 2);
        assert_eq!(dir.file_count as usize, dir.files.len());
        assert_eq!(dir.total_size, 350);
        assert_eq!(dir.file_paths().count(), 2);
    }

    #[test]
    fn test_empty_directory_not_materialized() {
        assert!(DiscoveredDirectory::from_files("/empty", Vec::new()).is_none());
    }

    #[test]
    fn test_suggestion_confidence() {
        let recent = Suggestion::new("/dl", SuggestionReason::RecentActivity, 3);
        let keyword = Suggestion::new("/m", SuggestionReason::MusicKeyword, 0);
        assert_eq!(recent.confidence, 0.8);
        assert_eq!(keyword.confidence, 0.6);
    }

    #[test]
    fn test_root_origin_display() {
        assert_eq!(RootOrigin::Configured.to_string(), "configured");
        assert_eq!(
            ScanRoot::new("/a", RootOrigin::Discovered).origin.to_string(),
            "discovered"
        );
    }
}
