//! Platform locations consulted during discovery.

use std::path::{Path, PathBuf};

use tracing::debug;

use riffshelf_core::ScanError;

/// Source of the directories the planner inspects.
///
/// Implementations only name candidate locations; existence checks and
/// walking happen in the planner.
pub trait LocationProvider: Send + Sync {
    /// The user's home directory, if it can be resolved.
    fn home_dir(&self) -> Option<PathBuf>;

    /// Conventional music locations (Music, Downloads, Documents, Desktop and
    /// platform extras).
    fn standard_locations(&self) -> Vec<PathBuf>;

    /// Locations checked for recent activity (Downloads, Desktop, Documents).
    fn recent_locations(&self) -> Vec<PathBuf>;

    /// Broad locations searched heuristically: home, external volumes and
    /// cloud-sync folders.
    fn broad_locations(&self) -> Result<Vec<PathBuf>, ScanError>;
}

/// Cloud-sync folder names looked up under the home directory.
const CLOUD_FOLDERS: &[&str] = &[
    "Dropbox",
    "OneDrive",
    "Google Drive",
    "iCloud Drive",
    "Library/Mobile Documents/com~apple~CloudDocs",
];

/// Locations resolved from the running platform via `dirs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLocations;

impl SystemLocations {
    pub fn new() -> Self {
        Self
    }

    fn platform_extras(home: Option<&Path>) -> Vec<PathBuf> {
        let mut extras = Vec::new();
        if cfg!(target_os = "macos") {
            if let Some(home) = home {
                extras.push(home.join("Music/iTunes/iTunes Media/Music"));
                extras.push(home.join("Music/Music/Media.localized/Music"));
            }
        } else if cfg!(windows) {
            extras.push(PathBuf::from(r"C:\Users\Public\Music"));
        } else if let Some(home) = home {
            extras.push(home.join(".local/share/music"));
        }
        extras
    }

    fn external_volumes() -> Vec<PathBuf> {
        let mut volumes = Vec::new();
        if cfg!(target_os = "macos") {
            volumes.extend(list_subdirectories(Path::new("/Volumes")));
        } else if cfg!(windows) {
            volumes.extend(
                ('D'..='Z')
                    .map(|letter| PathBuf::from(format!("{letter}:\\")))
                    .filter(|p| p.is_dir()),
            );
        } else {
            if let Ok(user) = std::env::var("USER") {
                volumes.extend(list_subdirectories(&Path::new("/media").join(user)));
            }
            volumes.extend(list_subdirectories(Path::new("/mnt")));
        }
        volumes
    }
}

impl LocationProvider for SystemLocations {
    fn home_dir(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }

    fn standard_locations(&self) -> Vec<PathBuf> {
        let mut locations: Vec<PathBuf> = [
            dirs::audio_dir(),
            dirs::download_dir(),
            dirs::document_dir(),
            dirs::desktop_dir(),
        ]
        .into_iter()
        .flatten()
        .collect();
        locations.extend(Self::platform_extras(self.home_dir().as_deref()));
        locations
    }

    fn recent_locations(&self) -> Vec<PathBuf> {
        [
            dirs::download_dir(),
            dirs::desktop_dir(),
            dirs::document_dir(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    fn broad_locations(&self) -> Result<Vec<PathBuf>, ScanError> {
        let home = self.home_dir().ok_or_else(|| ScanError::Location {
            message: "home directory could not be resolved".into(),
        })?;

        let mut locations = vec![home.clone()];
        locations.extend(Self::external_volumes());
        locations.extend(
            CLOUD_FOLDERS
                .iter()
                .map(|folder| home.join(folder))
                .filter(|p| p.is_dir()),
        );
        Ok(locations)
    }
}

/// Subdirectories of `parent`; an unreadable parent yields nothing.
fn list_subdirectories(parent: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(parent) {
        Ok(entries) => entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect(),
        Err(err) => {
            debug!(path = %parent.display(), error = %err, "Volume location unavailable");
            Vec::new()
        }
    }
}

/// Fixed locations, for embedding the planner and for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticLocations {
    pub home: Option<PathBuf>,
    pub standard: Vec<PathBuf>,
    pub recent: Vec<PathBuf>,
    pub broad: Vec<PathBuf>,
}

impl StaticLocations {
    /// Locations rooted at `home`, with nothing else configured.
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self {
            home: Some(home.into()),
            ..Default::default()
        }
    }

    pub fn with_standard(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.standard = paths.into_iter().collect();
        self
    }

    pub fn with_recent(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.recent = paths.into_iter().collect();
        self
    }

    pub fn with_broad(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.broad = paths.into_iter().collect();
        self
    }
}

impl LocationProvider for StaticLocations {
    fn home_dir(&self) -> Option<PathBuf> {
        self.home.clone()
    }

    fn standard_locations(&self) -> Vec<PathBuf> {
        self.standard.clone()
    }

    fn recent_locations(&self) -> Vec<PathBuf> {
        self.recent.clone()
    }

    fn broad_locations(&self) -> Result<Vec<PathBuf>, ScanError> {
        Ok(self.broad.clone())
    }
}
