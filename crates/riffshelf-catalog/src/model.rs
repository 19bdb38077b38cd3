//! Catalog records.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a catalog entry, assigned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl EntryId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// BLAKE3 digest of a file's head, tail and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Descriptive metadata for one audio file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub path: PathBuf,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_ms: Option<u64>,
    /// Lowercase file extension, e.g. `mp3`.
    pub format: String,
    pub bitrate_kbps: Option<u32>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub file_size: u64,
    pub content_hash: Option<ContentHash>,
    /// True when title or artist came from embedded tags rather than the
    /// file name.
    pub tagged: bool,
}

impl TrackMetadata {
    /// Metadata with only the path, format and size filled in.
    pub fn new(path: impl Into<PathBuf>, file_size: u64) -> Self {
        let path = path.into();
        let format = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        Self {
            path,
            format,
            file_size,
            ..Default::default()
        }
    }

    /// Title for display: the tag title, else the file stem.
    pub fn display_title(&self) -> String {
        self.title.clone().unwrap_or_else(|| {
            self.path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }
}

/// A persisted catalog record.
///
/// Entries without a path were added by hand and have no backing file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: EntryId,
    pub path: Option<PathBuf>,
    /// Hidden by the user; a rediscovery restores it.
    pub removed: bool,
    pub metadata: TrackMetadata,
    pub added_at: DateTime<Utc>,
}

impl CatalogEntry {
    pub fn new(id: EntryId, path: Option<PathBuf>, metadata: TrackMetadata) -> Self {
        Self {
            id,
            path,
            removed: false,
            metadata,
            added_at: Utc::now(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_live(&self) -> bool {
        !self.removed
    }
}
