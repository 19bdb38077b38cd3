//! Library session errors.

use thiserror::Error;

use riffshelf_catalog::CatalogError;
use riffshelf_core::{DiagnosticContext, ScanError};

/// Errors returned by a library scan.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The session cannot run with the current configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A run failed after it started; carries the context needed for triage.
    #[error("Library scan failed ({context}): {source}")]
    Run {
        context: Box<DiagnosticContext>,
        #[source]
        source: Box<LibraryError>,
    },

    #[error("Catalog store lock poisoned")]
    StorePoisoned,

    /// The background scan task panicked or was cancelled by the runtime.
    #[error("Scan task failed: {message}")]
    Task { message: String },
}

impl LibraryError {
    /// Attach run diagnostics.
    ///
    /// Precondition failures and errors that already carry context are
    /// returned unchanged.
    pub fn with_context(self, context: DiagnosticContext) -> Self {
        match self {
            Self::Run { .. }
            | Self::InvalidConfig { .. }
            | Self::Scan(ScanError::ScannerBusy)
            | Self::Scan(ScanError::Discovery { .. }) => self,
            other => Self::Run {
                context: Box::new(context),
                source: Box::new(other),
            },
        }
    }

    /// Whether the run was rejected because another one is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Scan(err) if err.is_busy())
    }

    /// Diagnostics attached to this error, if any.
    pub fn context(&self) -> Option<&DiagnosticContext> {
        match self {
            Self::Run { context, .. } => Some(context.as_ref()),
            Self::Scan(ScanError::Discovery { context, .. }) => Some(context.as_ref()),
            _ => None,
        }
    }
}
