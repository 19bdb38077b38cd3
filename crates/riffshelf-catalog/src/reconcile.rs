//! Reconciliation of discovered files against the catalog.
//!
//! Reconciliation is a pure set computation. It reads the catalog through
//! [`CatalogLookup`] and returns a [`ReconcilePlan`]; applying the plan is
//! the caller's job.
//!
//! Order of the steps:
//!
//! 1. Catalog entries under an excluded path are retired.
//! 2. Other entries with a recorded path that were not discovered and whose
//!    file is gone are retired. Path-less entries are never retired.
//! 3. Each unique discovered path is skipped (excluded), new, restored or
//!    existing.
//! 4. Only the first `max_new_files` new paths are processed.

use std::path::{Path, PathBuf};

use derive_builder::Builder;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use riffshelf_core::{DEFAULT_MAX_NEW_FILES, is_excluded};

use crate::error::CatalogError;
use crate::model::EntryId;
use crate::store::CatalogLookup;

/// Configuration for reconciliation.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct ReconcileConfig {
    /// New files processed per run; the rest are reported as remaining.
    #[builder(default = "DEFAULT_MAX_NEW_FILES")]
    pub max_new_files: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_new_files: DEFAULT_MAX_NEW_FILES,
        }
    }
}

impl ReconcileConfig {
    pub fn builder() -> ReconcileConfigBuilder {
        ReconcileConfigBuilder::default()
    }
}

/// Actions computed by one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Number of unique discovered paths.
    pub discovered: usize,
    /// New paths to extract and insert this run.
    pub to_process: Vec<PathBuf>,
    /// New paths left for a later run.
    pub remaining: Vec<PathBuf>,
    /// Removed entries that were rediscovered.
    pub restore: Vec<EntryId>,
    pub existing_count: usize,
    /// Catalogued paths under an excluded path.
    pub retire_excluded: Vec<PathBuf>,
    /// Catalogued paths whose file no longer exists.
    pub retire_missing: Vec<PathBuf>,
    /// Discovered paths ignored because they are excluded.
    pub excluded_skipped: Vec<PathBuf>,
}

impl ReconcilePlan {
    /// New paths found, processed or not.
    pub fn new_count(&self) -> usize {
        self.to_process.len() + self.remaining.len()
    }

    /// Every path to delete from the catalog.
    pub fn retirements(&self) -> Vec<PathBuf> {
        self.retire_excluded
            .iter()
            .chain(self.retire_missing.iter())
            .cloned()
            .collect()
    }

    /// True when applying the plan would change nothing.
    pub fn is_noop(&self) -> bool {
        self.new_count() == 0
            && self.restore.is_empty()
            && self.retire_excluded.is_empty()
            && self.retire_missing.is_empty()
    }

    /// Run result as computed by the plan.
    pub fn to_result(&self) -> ScanRunResult {
        ScanRunResult {
            discovered: self.discovered,
            processed: self.to_process.len(),
            new_files: self.to_process.clone(),
            new_count: self.new_count(),
            restored_ids: self.restore.clone(),
            existing_count: self.existing_count,
            removed_missing_count: self.retire_missing.len(),
            removed_excluded_count: self.retire_excluded.len(),
            excluded_skipped_count: self.excluded_skipped.len(),
            remaining_count: self.remaining.len(),
            truncated: !self.remaining.is_empty(),
        }
    }
}

/// Outcome of one scan run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRunResult {
    pub discovered: usize,
    pub processed: usize,
    /// Paths inserted this run.
    pub new_files: Vec<PathBuf>,
    pub new_count: usize,
    pub restored_ids: Vec<EntryId>,
    pub existing_count: usize,
    pub removed_missing_count: usize,
    pub removed_excluded_count: usize,
    pub excluded_skipped_count: usize,
    pub remaining_count: usize,
    pub truncated: bool,
}

impl ScanRunResult {
    /// Whether every discovered path was classified exactly once.
    pub fn is_balanced(&self) -> bool {
        self.discovered
            == self.existing_count
                + self.new_count
                + self.restored_ids.len()
                + self.excluded_skipped_count
    }
}

/// Computes add, restore and retire sets.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Reconcile `discovered` against `catalog`.
    ///
    /// `exists` reports whether a catalogued file is still on disk; pass
    /// `Path::exists` outside of tests. Lookup errors propagate unchanged.
    pub fn reconcile<C, F>(
        &self,
        discovered: &[PathBuf],
        catalog: &C,
        excluded: &[PathBuf],
        exists: F,
    ) -> Result<ReconcilePlan, CatalogError>
    where
        C: CatalogLookup + ?Sized,
        F: Fn(&Path) -> bool,
    {
        let unique: IndexSet<&Path> = discovered.iter().map(PathBuf::as_path).collect();
        let mut plan = ReconcilePlan {
            discovered: unique.len(),
            ..Default::default()
        };

        for entry in catalog.entries()? {
            let Some(path) = entry.path().filter(|p| !p.as_os_str().is_empty()) else {
                continue;
            };
            if is_excluded(path, excluded) {
                plan.retire_excluded.push(path.to_path_buf());
            } else if !unique.contains(path) && !exists(path) {
                plan.retire_missing.push(path.to_path_buf());
            }
        }

        let mut new_paths = Vec::new();
        for &path in &unique {
            if is_excluded(path, excluded) {
                plan.excluded_skipped.push(path.to_path_buf());
                continue;
            }
            match catalog.find_by_path(path)? {
                None => new_paths.push(path.to_path_buf()),
                Some(entry) if entry.removed => plan.restore.push(entry.id),
                Some(_) => plan.existing_count += 1,
            }
        }

        let cap = self.config.max_new_files.min(new_paths.len());
        plan.remaining = new_paths.split_off(cap);
        plan.to_process = new_paths;

        debug!(
            discovered = plan.discovered,
            new = plan.new_count(),
            processed = plan.to_process.len(),
            restore = plan.restore.len(),
            existing = plan.existing_count,
            retire_excluded = plan.retire_excluded.len(),
            retire_missing = plan.retire_missing.len(),
            "Reconciled"
        );

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrackMetadata;
    use crate::store::{CatalogStore, JsonCatalog};

    fn paths(list: &[&str]) -> Vec<PathBuf> {
        list.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_empty_catalog_everything_new() {
        let catalog = JsonCatalog::in_memory();
        let plan = Reconciler::default()
            .reconcile(&paths(&["/a.mp3", "/b.mp3"]), &catalog, &[], |_| true)
            .unwrap();

        assert_eq!(plan.new_count(), 2);
        assert_eq!(plan.to_process.len(), 2);
        assert!(plan.remaining.is_empty());
        assert!(plan.to_result().is_balanced());
    }

    #[test]
    fn test_duplicate_discovered_paths_count_once() {
        let catalog = JsonCatalog::in_memory();
        let plan = Reconciler::default()
            .reconcile(&paths(&["/a.mp3", "/a.mp3"]), &catalog, &[], |_| true)
            .unwrap();

        assert_eq!(plan.discovered, 1);
        assert_eq!(plan.to_process, paths(&["/a.mp3"]));
    }

    #[test]
    fn test_missing_undiscovered_entry_is_retired() {
        let mut catalog = JsonCatalog::in_memory();
        catalog
            .insert_batch(vec![
                TrackMetadata::new("/gone.mp3", 1),
                TrackMetadata::new("/kept.mp3", 1),
            ])
            .unwrap();

        let plan = Reconciler::default()
            .reconcile(&[], &catalog, &[], |p| p == Path::new("/kept.mp3"))
            .unwrap();

        assert_eq!(plan.retire_missing, paths(&["/gone.mp3"]));
        assert!(plan.retire_excluded.is_empty());
    }

    #[test]
    fn test_excluded_and_missing_counts_as_excluded() {
        let mut catalog = JsonCatalog::in_memory();
        catalog
            .insert_batch(vec![TrackMetadata::new("/music/a.mp3", 1)])
            .unwrap();

        let plan = Reconciler::default()
            .reconcile(&[], &catalog, &paths(&["/music"]), |_| false)
            .unwrap();

        assert_eq!(plan.retire_excluded.len(), 1);
        assert!(plan.retire_missing.is_empty());
        assert_eq!(plan.retirements().len(), 1);
    }
}
