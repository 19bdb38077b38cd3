//! Catalog error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by catalog stores.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Reading or writing the catalog file failed.
    #[error("Catalog I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The catalog file is not valid JSON for this format.
    #[error("Failed to parse catalog {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize catalog: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A batch tried to insert a path that is already catalogued.
    #[error("Path already in catalog: {path}")]
    DuplicatePath { path: PathBuf },

    /// A store-specific failure.
    #[error("{message}")]
    Backend { message: String },
}

impl CatalogError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
