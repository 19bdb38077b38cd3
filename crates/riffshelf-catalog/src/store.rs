//! Catalog storage contract and the JSON-file store.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use riffshelf_core::is_excluded;

use crate::error::CatalogError;
use crate::model::{CatalogEntry, EntryId, TrackMetadata};

/// Read access to the catalog, used by reconciliation.
pub trait CatalogLookup {
    /// Entry recorded for `path`, removed or not.
    fn find_by_path(&self, path: &Path) -> Result<Option<CatalogEntry>, CatalogError>;

    /// Every entry, including removed and path-less ones.
    fn entries(&self) -> Result<Vec<CatalogEntry>, CatalogError>;
}

/// Mutating catalog operations.
///
/// Each call is all-or-nothing: on error the catalog is left unchanged.
pub trait CatalogStore: CatalogLookup + Send {
    /// Insert one entry per record. Fails without inserting anything if any
    /// path is already catalogued or repeated within the batch.
    fn insert_batch(
        &mut self,
        records: Vec<TrackMetadata>,
    ) -> Result<Vec<CatalogEntry>, CatalogError>;

    /// Flag entries as removed. Returns how many changed state.
    fn mark_removed(&mut self, ids: &[EntryId]) -> Result<usize, CatalogError>;

    /// Clear the removed flag. Returns `false` if the entry is unknown or
    /// was not removed.
    fn unmark_removed(&mut self, id: EntryId) -> Result<bool, CatalogError>;

    /// Delete every entry whose path equals or lies beneath one of `paths`.
    /// Returns the number of entries deleted.
    fn delete_missing_or_excluded(&mut self, paths: &[PathBuf]) -> Result<usize, CatalogError>;

    /// Insert, restore and retire in one step. Either the whole batch is
    /// applied or nothing is.
    fn apply_batch(&mut self, batch: CatalogBatch) -> Result<BatchOutcome, CatalogError>;
}

/// Catalog changes produced by one reconciliation.
#[derive(Debug, Clone, Default)]
pub struct CatalogBatch {
    /// New entries to insert.
    pub insert: Vec<TrackMetadata>,
    /// Removed entries to bring back.
    pub restore: Vec<EntryId>,
    /// Paths (and everything beneath them) to delete.
    pub retire: Vec<PathBuf>,
}

impl CatalogBatch {
    pub fn is_empty(&self) -> bool {
        self.insert.is_empty() && self.restore.is_empty() && self.retire.is_empty()
    }
}

/// What [`CatalogStore::apply_batch`] changed.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub inserted: Vec<CatalogEntry>,
    pub restored: usize,
    pub retired: usize,
}

/// On-disk layout of a JSON catalog.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogFile {
    next_id: u64,
    entries: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, Default)]
struct CatalogState {
    next_id: u64,
    entries: IndexMap<EntryId, CatalogEntry>,
    by_path: HashMap<PathBuf, EntryId>,
}

impl CatalogState {
    fn from_file(file: CatalogFile) -> Self {
        let mut state = Self {
            next_id: file.next_id,
            ..Default::default()
        };
        for entry in file.entries {
            state.next_id = state.next_id.max(entry.id.0 + 1);
            state.push(entry);
        }
        state
    }

    fn to_file(&self) -> CatalogFile {
        CatalogFile {
            next_id: self.next_id,
            entries: self.entries.values().cloned().collect(),
        }
    }

    fn push(&mut self, entry: CatalogEntry) {
        if let Some(path) = &entry.path {
            self.by_path.insert(path.clone(), entry.id);
        }
        self.entries.insert(entry.id, entry);
    }

    fn allocate_id(&mut self) -> EntryId {
        let id = EntryId::new(self.next_id);
        self.next_id += 1;
        id
    }

    fn insert_records(
        &mut self,
        records: Vec<TrackMetadata>,
    ) -> Result<Vec<CatalogEntry>, CatalogError> {
        let mut inserted = Vec::with_capacity(records.len());
        for metadata in records {
            if self.by_path.contains_key(&metadata.path) {
                return Err(CatalogError::DuplicatePath {
                    path: metadata.path,
                });
            }
            let entry = CatalogEntry::new(self.allocate_id(), Some(metadata.path.clone()), metadata);
            self.push(entry.clone());
            inserted.push(entry);
        }
        Ok(inserted)
    }

    fn set_removed(&mut self, ids: &[EntryId], removed: bool) -> usize {
        let mut changed = 0;
        for id in ids {
            if let Some(entry) = self.entries.get_mut(id).filter(|e| e.removed != removed) {
                entry.removed = removed;
                changed += 1;
            }
        }
        changed
    }

    fn retire(&mut self, paths: &[PathBuf]) -> usize {
        if paths.is_empty() {
            return 0;
        }
        let doomed: Vec<EntryId> = self
            .entries
            .values()
            .filter(|e| e.path().is_some_and(|p| is_excluded(p, paths)))
            .map(|e| e.id)
            .collect();
        for id in &doomed {
            if let Some(entry) = self.entries.shift_remove(id)
                && let Some(path) = entry.path
            {
                self.by_path.remove(&path);
            }
        }
        doomed.len()
    }
}

/// Catalog kept in memory and persisted as a JSON file.
///
/// Mutations build the next state, write it to a temporary file, rename it
/// over the catalog file and only then replace the in-memory state.
#[derive(Debug, Default)]
pub struct JsonCatalog {
    path: Option<PathBuf>,
    state: CatalogState,
}

impl JsonCatalog {
    /// A catalog that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the catalog at `path`, starting empty if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let path = path.into();
        let state = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| CatalogError::io(&path, e))?;
            let file: CatalogFile =
                serde_json::from_str(&content).map_err(|source| CatalogError::Parse {
                    path: path.clone(),
                    source,
                })?;
            CatalogState::from_file(file)
        } else {
            CatalogState::default()
        };

        info!(path = %path.display(), entries = state.entries.len(), "Opened catalog");
        Ok(Self {
            path: Some(path),
            state,
        })
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.state.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.entries.is_empty()
    }

    pub fn get(&self, id: EntryId) -> Option<&CatalogEntry> {
        self.state.entries.get(&id)
    }

    /// Add an entry with no backing file.
    pub fn insert_manual(&mut self, metadata: TrackMetadata) -> Result<CatalogEntry, CatalogError> {
        let mut next = self.state.clone();
        let entry = CatalogEntry::new(next.allocate_id(), None, metadata);
        next.push(entry.clone());
        self.commit(next)?;
        Ok(entry)
    }

    fn commit(&mut self, next: CatalogState) -> Result<(), CatalogError> {
        if let Some(path) = &self.path {
            write_atomically(path, &next.to_file())?;
        }
        self.state = next;
        Ok(())
    }
}

fn write_atomically(path: &Path, file: &CatalogFile) -> Result<(), CatalogError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| CatalogError::io(parent, e))?;
    }
    let json = serde_json::to_string_pretty(file)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| CatalogError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| CatalogError::io(path, e))?;
    debug!(path = %path.display(), entries = file.entries.len(), "Catalog written");
    Ok(())
}

impl CatalogLookup for JsonCatalog {
    fn find_by_path(&self, path: &Path) -> Result<Option<CatalogEntry>, CatalogError> {
        Ok(self
            .state
            .by_path
            .get(path)
            .and_then(|id| self.state.entries.get(id))
            .cloned())
    }

    fn entries(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        Ok(self.state.entries.values().cloned().collect())
    }
}

impl CatalogStore for JsonCatalog {
    fn insert_batch(
        &mut self,
        records: Vec<TrackMetadata>,
    ) -> Result<Vec<CatalogEntry>, CatalogError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut next = self.state.clone();
        let inserted = next.insert_records(records)?;
        self.commit(next)?;
        Ok(inserted)
    }

    fn mark_removed(&mut self, ids: &[EntryId]) -> Result<usize, CatalogError> {
        let mut next = self.state.clone();
        let changed = next.set_removed(ids, true);
        if changed > 0 {
            self.commit(next)?;
        }
        Ok(changed)
    }

    fn unmark_removed(&mut self, id: EntryId) -> Result<bool, CatalogError> {
        let mut next = self.state.clone();
        if next.set_removed(&[id], false) == 0 {
            return Ok(false);
        }
        self.commit(next)?;
        Ok(true)
    }

    fn delete_missing_or_excluded(&mut self, paths: &[PathBuf]) -> Result<usize, CatalogError> {
        let mut next = self.state.clone();
        let deleted = next.retire(paths);
        if deleted > 0 {
            self.commit(next)?;
        }
        Ok(deleted)
    }

    fn apply_batch(&mut self, batch: CatalogBatch) -> Result<BatchOutcome, CatalogError> {
        if batch.is_empty() {
            return Ok(BatchOutcome::default());
        }

        let mut next = self.state.clone();
        let outcome = BatchOutcome {
            inserted: next.insert_records(batch.insert)?,
            restored: next.set_removed(&batch.restore, false),
            retired: next.retire(&batch.retire),
        };
        self.commit(next)?;
        debug!(
            inserted = outcome.inserted.len(),
            restored = outcome.restored,
            retired = outcome.retired,
            "Applied catalog batch"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn track(path: &str) -> TrackMetadata {
        TrackMetadata::new(path, 100)
    }

    #[test]
    fn test_insert_and_find() {
        let mut catalog = JsonCatalog::in_memory();
        let inserted = catalog
            .insert_batch(vec![track("/music/a.mp3"), track("/music/b.mp3")])
            .unwrap();

        assert_eq!(inserted.len(), 2);
        assert_ne!(inserted[0].id, inserted[1].id);
        let found = catalog
            .find_by_path(Path::new("/music/b.mp3"))
            .unwrap()
            .unwrap();
        assert_eq!(found.id, inserted[1].id);
        assert!(found.is_live());
    }

    #[test]
    fn test_duplicate_batch_leaves_catalog_unchanged() {
        let mut catalog = JsonCatalog::in_memory();
        catalog.insert_batch(vec![track("/music/a.mp3")]).unwrap();

        let result = catalog.insert_batch(vec![track("/music/new.mp3"), track("/music/a.mp3")]);
        assert!(matches!(result, Err(CatalogError::DuplicatePath { .. })));
        assert_eq!(catalog.len(), 1);
        assert!(
            catalog
                .find_by_path(Path::new("/music/new.mp3"))
                .unwrap()
                .is_none()
        );

        let result = catalog.insert_batch(vec![track("/x.mp3"), track("/x.mp3")]);
        assert!(result.is_err());
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_mark_and_unmark_removed() {
        let mut catalog = JsonCatalog::in_memory();
        let id = catalog.insert_batch(vec![track("/a.mp3")]).unwrap()[0].id;

        assert_eq!(catalog.mark_removed(&[id, EntryId::new(99)]).unwrap(), 1);
        assert_eq!(catalog.mark_removed(&[id]).unwrap(), 0);
        assert!(catalog.get(id).unwrap().removed);

        assert!(catalog.unmark_removed(id).unwrap());
        assert!(!catalog.unmark_removed(id).unwrap());
        assert!(!catalog.unmark_removed(EntryId::new(99)).unwrap());
    }

    #[test]
    fn test_delete_by_prefix_spares_manual_entries() {
        let mut catalog = JsonCatalog::in_memory();
        catalog
            .insert_batch(vec![
                track("/music/a.mp3"),
                track("/music/live/b.mp3"),
                track("/musicals/c.mp3"),
            ])
            .unwrap();
        catalog.insert_manual(track("/music/manual.mp3")).unwrap();

        let deleted = catalog
            .delete_missing_or_excluded(&[PathBuf::from("/music")])
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(catalog.len(), 2);
        assert!(
            catalog
                .find_by_path(Path::new("/musicals/c.mp3"))
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn test_apply_batch() {
        let mut catalog = JsonCatalog::in_memory();
        let ids: Vec<EntryId> = catalog
            .insert_batch(vec![track("/music/a.mp3"), track("/music/gone.mp3")])
            .unwrap()
            .iter()
            .map(|e| e.id)
            .collect();
        catalog.mark_removed(&[ids[0]]).unwrap();

        let outcome = catalog
            .apply_batch(CatalogBatch {
                insert: vec![track("/music/new.mp3")],
                restore: vec![ids[0]],
                retire: vec![PathBuf::from("/music/gone.mp3")],
            })
            .unwrap();

        assert_eq!(outcome.inserted.len(), 1);
        assert_eq!(outcome.restored, 1);
        assert_eq!(outcome.retired, 1);
        assert!(catalog.get(ids[0]).unwrap().is_live());
        assert!(catalog.get(ids[1]).is_none());
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_failed_batch_write_changes_nothing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("catalog.json");
        let mut catalog = JsonCatalog::open(&path).unwrap();
        let ids: Vec<EntryId> = catalog
            .insert_batch(vec![track("/music/a.mp3"), track("/music/gone.mp3")])
            .unwrap()
            .iter()
            .map(|e| e.id)
            .collect();
        catalog.mark_removed(&[ids[0]]).unwrap();
        let on_disk = fs::read_to_string(&path).unwrap();

        // A directory in the temp file's place makes the write fail.
        fs::create_dir(path.with_extension("json.tmp")).unwrap();
        let result = catalog.apply_batch(CatalogBatch {
            insert: vec![track("/music/new.mp3")],
            restore: vec![ids[0]],
            retire: vec![PathBuf::from("/music/gone.mp3")],
        });

        assert!(matches!(result, Err(CatalogError::Io { .. })));
        assert_eq!(catalog.len(), 2);
        assert!(catalog.get(ids[0]).unwrap().removed);
        assert!(catalog.get(ids[1]).is_some());
        assert!(
            catalog
                .find_by_path(Path::new("/music/new.mp3"))
                .unwrap()
                .is_none()
        );
        assert_eq!(fs::read_to_string(&path).unwrap(), on_disk);
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data/catalog.json");

        let id = {
            let mut catalog = JsonCatalog::open(&path).unwrap();
            assert!(catalog.is_empty());
            let id = catalog.insert_batch(vec![track("/a.mp3"), track("/b.mp3")]).unwrap()[0].id;
            catalog.mark_removed(&[id]).unwrap();
            id
        };

        let mut reopened = JsonCatalog::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert!(reopened.get(id).unwrap().removed);
        assert!(!path.with_extension("json.tmp").exists());

        let fresh = reopened.insert_batch(vec![track("/c.mp3")]).unwrap();
        assert!(fresh[0].id.0 >= 2);
    }

    #[test]
    fn test_corrupt_file_is_a_parse_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("catalog.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(
            JsonCatalog::open(&path),
            Err(CatalogError::Parse { .. })
        ));
    }
}
