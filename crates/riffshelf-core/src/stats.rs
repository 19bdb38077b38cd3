//! Walk statistics.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Counters accumulated while walking one or more roots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkStats {
    /// Candidate files found.
    pub total_files: u64,
    /// Bytes across candidate files.
    pub total_size: u64,
    /// Directories whose listing was read (or attempted).
    pub dirs_visited: u64,
    /// Deepest directory visited, relative to its root.
    pub max_depth: u32,
    /// Largest candidate file (path, size).
    pub largest_file: Option<(PathBuf, u64)>,
}

impl WalkStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a candidate file.
    pub fn record_file(&mut self, path: PathBuf, size: u64) {
        self.total_files += 1;
        self.total_size += size;

        if self.largest_file.as_ref().is_none_or(|(_, s)| size > *s) {
            self.largest_file = Some((path, size));
        }
    }

    /// Record a visited directory.
    pub fn record_dir(&mut self, depth: u32) {
        self.dirs_visited += 1;
        self.max_depth = self.max_depth.max(depth);
    }

    /// Fold another set of stats into this one.
    pub fn merge(&mut self, other: &WalkStats) {
        self.total_files += other.total_files;
        self.total_size += other.total_size;
        self.dirs_visited += other.dirs_visited;
        self.max_depth = self.max_depth.max(other.max_depth);

        if let Some((path, size)) = &other.largest_file {
            if self.largest_file.as_ref().is_none_or(|(_, s)| size > s) {
                self.largest_file = Some((path.clone(), *size));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_stats_default() {
        let stats = WalkStats::default();
        assert_eq!(stats.total_size, 0);
        assert_eq!(stats.total_files, 0);
        assert_eq!(stats.dirs_visited, 0);
    }

    #[test]
    fn test_record_and_merge() {
        let mut a = WalkStats::new();
        a.record_dir(0);
        a.record_file(PathBuf::from("/a/1.mp3"), 10);

        let mut b = WalkStats::new();
        b.record_dir(3);
        b.record_file(PathBuf::from("/b/2.mp3"), 40);

        a.merge(&b);
        assert_eq!(a.total_files, 2);
        assert_eq!(a.total_size, 50);
        assert_eq!(a.dirs_visited, 2);
        assert_eq!(a.max_depth, 3);
        assert_eq!(a.largest_file, Some((PathBuf::from("/b/2.mp3"), 40)));
    }
}
