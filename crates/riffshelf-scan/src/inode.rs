//! Directory identity tracking for symlink cycle protection.

use dashmap::DashSet;
use serde::{Deserialize, Serialize};

/// Device and inode pair identifying a physical directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirIdentity {
    /// Inode number.
    pub inode: u64,
    /// Device ID.
    pub device: u64,
}

impl DirIdentity {
    /// Create a new identity.
    pub fn new(inode: u64, device: u64) -> Self {
        Self { inode, device }
    }

    /// Identity of the directory described by `metadata`.
    ///
    /// Returns `None` on platforms without stable inode numbers.
    #[cfg(unix)]
    pub fn from_metadata(metadata: &std::fs::Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self::new(metadata.ino(), metadata.dev()))
    }

    #[cfg(not(unix))]
    pub fn from_metadata(_metadata: &std::fs::Metadata) -> Option<Self> {
        None
    }
}

/// Tracks directories already read during one walk.
///
/// Following symlinks can reach the same directory through several paths, or
/// loop back into an ancestor. Each physical directory is read once. The set
/// is shared with jwalk's read-dir callback, hence the concurrent set.
#[derive(Debug, Default)]
pub struct VisitedDirs {
    seen: DashSet<DirIdentity>,
}

impl VisitedDirs {
    /// Create a new tracker.
    pub fn new() -> Self {
        Self {
            seen: DashSet::new(),
        }
    }

    /// Track a directory. Returns `true` if this is the first visit.
    pub fn track(&self, identity: DirIdentity) -> bool {
        self.seen.insert(identity)
    }

    /// Track the directory at `metadata`.
    ///
    /// Directories without an identity are always treated as first visits.
    pub fn track_metadata(&self, metadata: &std::fs::Metadata) -> bool {
        DirIdentity::from_metadata(metadata).is_none_or(|identity| self.track(identity))
    }

    /// Check if a directory has been seen (without tracking).
    pub fn has_seen(&self, identity: &DirIdentity) -> bool {
        self.seen.contains(identity)
    }

    /// Get the number of unique directories tracked.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Check if no directories have been tracked.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_new_directory() {
        let visited = VisitedDirs::new();
        let id = DirIdentity::new(12345, 1);

        assert!(visited.track(id));
        assert!(!visited.track(id));
        assert_eq!(visited.len(), 1);
    }

    #[test]
    fn test_has_seen() {
        let visited = VisitedDirs::new();
        let id = DirIdentity::new(12345, 1);

        assert!(!visited.has_seen(&id));
        visited.track(id);
        assert!(visited.has_seen(&id));
    }

    #[test]
    fn test_different_devices() {
        let visited = VisitedDirs::new();
        assert!(visited.track(DirIdentity::new(12345, 1)));
        assert!(visited.track(DirIdentity::new(12345, 2)));
    }

    #[cfg(unix)]
    #[test]
    fn test_track_metadata() {
        let temp = tempfile::TempDir::new().unwrap();
        let metadata = std::fs::metadata(temp.path()).unwrap();
        let visited = VisitedDirs::new();

        assert!(visited.track_metadata(&metadata));
        assert!(!visited.track_metadata(&metadata));
    }
}
