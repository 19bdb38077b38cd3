//! Error types for discovery and scanning operations.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during discovery and scanning.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// Another scan is already running on this scanner.
    #[error("A scan is already in progress")]
    ScannerBusy,

    /// A platform location (home directory, volumes) could not be resolved.
    #[error("Could not resolve location: {message}")]
    Location { message: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A discovery run failed; carries the context needed for triage.
    #[error("Discovery failed ({context}): {source}")]
    Discovery {
        context: Box<DiagnosticContext>,
        #[source]
        source: Box<ScanError>,
    },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl ScanError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Wrap this error with diagnostic context.
    ///
    /// Errors that already carry context are returned unchanged.
    pub fn with_context(self, context: DiagnosticContext) -> Self {
        match self {
            err @ Self::Discovery { .. } => err,
            err @ Self::ScannerBusy => err,
            err => Self::Discovery {
                context: Box::new(context),
                source: Box::new(err),
            },
        }
    }

    /// Whether this error is the busy precondition failure.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::ScannerBusy)
    }
}

/// Environment details attached to run-level failures.
///
/// Filesystem permission failures differ a lot between platforms, so a failed
/// run reports where it looked and under which conditions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticContext {
    /// Operating system the run executed on.
    pub platform: String,
    /// Home directory, if it could be resolved.
    pub home: Option<PathBuf>,
    /// Paths the run attempted before failing.
    pub attempted: Vec<PathBuf>,
    /// Whether the configuration lock was engaged.
    pub locked: bool,
}

impl DiagnosticContext {
    /// Capture the current platform with no attempted paths yet.
    pub fn capture(home: Option<PathBuf>, locked: bool) -> Self {
        Self {
            platform: std::env::consts::OS.to_string(),
            home,
            attempted: Vec::new(),
            locked,
        }
    }

    /// Record a path the run tried to read.
    pub fn attempt(&mut self, path: &Path) {
        if !self.attempted.iter().any(|p| p == path) {
            self.attempted.push(path.to_path_buf());
        }
    }
}

impl fmt::Display for DiagnosticContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "platform={}", self.platform)?;
        match &self.home {
            Some(home) => write!(f, ", home={}", home.display())?,
            None => write!(f, ", home=<unknown>")?,
        }
        write!(
            f,
            ", attempted={} path(s), locked={}",
            self.attempted.len(),
            self.locked
        )
    }
}

/// Errors raised while loading, validating or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No platform configuration directory is available.
    #[error("No configuration directory available on this platform")]
    NoConfigDir,

    /// Reading or writing the configuration file failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The configuration could not be serialized.
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A field holds an unusable value.
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Kind of scan warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// Permission was denied.
    PermissionDenied,
    /// Error reading a directory listing.
    ReadError,
    /// Error reading metadata.
    MetadataError,
}

/// Non-fatal warning encountered during a walk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanWarning {
    /// Path where the warning occurred.
    pub path: PathBuf,
    /// Human-readable message.
    pub message: String,
    /// Kind of warning.
    pub kind: WarningKind,
}

impl ScanWarning {
    /// Create a new scan warning.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Create a warning for a failed directory listing.
    ///
    /// Permission failures are classified separately so callers can tell an
    /// empty result from a denied one.
    pub fn read_error(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        let path = path.into();
        let kind = if error.kind() == std::io::ErrorKind::PermissionDenied {
            WarningKind::PermissionDenied
        } else {
            WarningKind::ReadError
        };
        Self {
            message: format!("Read error: {error}"),
            path,
            kind,
        }
    }

    /// Create a warning for an entry whose metadata could not be read.
    pub fn metadata_error(path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        Self {
            message: format!("Metadata error: {message}"),
            path: path.into(),
            kind: WarningKind::MetadataError,
        }
    }
}
