//! Library scan sessions for riffshelf.
//!
//! A [`LibraryScanner`] ties discovery, reconciliation, metadata extraction
//! and the catalog store together behind a single-flight `run()`, and
//! [`start_library_scan`] runs it in the background with progress reported
//! over a channel.

mod error;
mod events;
mod session;

pub use error::LibraryError;
pub use events::{LibraryEvent, start_library_scan};
pub use session::{LibraryScanner, ScanReport};

/// Default channel buffer size for library scan events.
pub const LIBRARY_CHANNEL_SIZE: usize = 100;
