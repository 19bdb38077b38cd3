//! Track catalog and reconciliation for riffshelf.
//!
//! This crate owns everything that happens after discovery:
//!
//! - **Storage** - the [`CatalogStore`] contract and [`JsonCatalog`], a
//!   JSON-file store with all-or-nothing mutations
//! - **Reconciliation** - [`Reconciler`] computes which discovered files are
//!   new, which removed entries come back and which entries are retired
//! - **Metadata** - [`TagExtractor`] reads ID3 and container tags, stream
//!   properties and a partial BLAKE3 hash
//!
//! # Reconciliation
//!
//! ```rust
//! use std::path::PathBuf;
//! use riffshelf_catalog::{JsonCatalog, Reconciler};
//!
//! let catalog = JsonCatalog::in_memory();
//! let discovered = vec![PathBuf::from("/music/a.mp3")];
//!
//! let plan = Reconciler::default()
//!     .reconcile(&discovered, &catalog, &[], |p| p.exists())
//!     .unwrap();
//!
//! assert_eq!(plan.to_process, discovered);
//! assert!(plan.to_result().is_balanced());
//! ```

mod error;
mod metadata;
mod model;
mod reconcile;
mod store;

pub use error::CatalogError;
pub use metadata::{
    ExtractConfig, ExtractConfigBuilder, MetadataExtractor, TagExtractor, extract_batch,
    title_from_file_name,
};
pub use model::{CatalogEntry, ContentHash, EntryId, TrackMetadata};
pub use reconcile::{ReconcileConfig, ReconcileConfigBuilder, ReconcilePlan, Reconciler, ScanRunResult};
pub use store::{BatchOutcome, CatalogBatch, CatalogLookup, CatalogStore, JsonCatalog};
