//! Walk and library configuration types.

use std::path::{Path, PathBuf};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::classify::{
    DEFAULT_EXTENSIONS, DEFAULT_MUSIC_KEYWORDS, DEFAULT_NOISE_DIRECTORIES, MusicKeywords,
    PathClassifier,
};
use crate::error::ConfigError;

/// Default walk depth below a root.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Default number of new files processed per scan run.
pub const DEFAULT_MAX_NEW_FILES: usize = 1000;

/// Configuration for a single directory walk.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
pub struct WalkConfig {
    /// Deepest directory level read below the root (root = 0).
    #[builder(default = "DEFAULT_MAX_DEPTH")]
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Follow symbolic links to directories and files.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub follow_links: bool,

    /// Paths never descended into (component-wise prefixes).
    #[builder(default)]
    #[serde(default)]
    pub excluded_paths: Vec<PathBuf>,
}

impl WalkConfig {
    /// Create a new walk config builder.
    pub fn builder() -> WalkConfigBuilder {
        WalkConfigBuilder::default()
    }

    /// Copy of this config with a different depth bound.
    pub fn with_max_depth(&self, max_depth: usize) -> Self {
        Self {
            max_depth,
            ..self.clone()
        }
    }
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            follow_links: true,
            excluded_paths: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

/// Persistent library configuration, stored as TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Directories the user enabled for scanning.
    pub enabled_paths: Vec<PathBuf>,
    /// Directories never scanned; wins over `enabled_paths`.
    pub excluded_paths: Vec<PathBuf>,
    /// Audio extensions treated as candidate files.
    pub supported_extensions: Vec<String>,
    /// Directory name fragments skipped during walks.
    pub noise_directories: Vec<String>,
    /// Keywords marking music-like directory names.
    pub music_keywords: Vec<String>,
    /// Once set, only `enabled_paths` are scanned.
    pub locked: bool,
    /// Walk depth below each root.
    pub max_depth: usize,
    /// Depth of the heuristic keyword search.
    pub heuristic_depth: usize,
    /// Depth up to which non-matching directories are still searched.
    pub fanout_depth: usize,
    /// Recent-location window for suggestions, in days (0 disables the check).
    pub recent_window_days: u32,
    /// New files processed per scan run.
    pub max_new_files: usize,
    /// Maximum suggestions returned by discovery.
    pub max_suggestions: usize,
    /// Follow symbolic links while walking.
    pub follow_links: bool,
    /// Catalog file location; defaults to the platform data directory.
    pub catalog_path: Option<PathBuf>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            enabled_paths: Vec::new(),
            excluded_paths: Vec::new(),
            supported_extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            noise_directories: DEFAULT_NOISE_DIRECTORIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            music_keywords: DEFAULT_MUSIC_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            locked: false,
            max_depth: DEFAULT_MAX_DEPTH,
            heuristic_depth: 3,
            fanout_depth: 2,
            recent_window_days: 30,
            max_new_files: DEFAULT_MAX_NEW_FILES,
            max_suggestions: 10,
            follow_links: true,
            catalog_path: None,
        }
    }
}

impl LibraryConfig {
    /// Default config file location.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("riffshelf").join("config.toml"))
    }

    /// Default catalog location.
    pub fn default_catalog_path() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("riffshelf").join("catalog.json"))
    }

    /// Load the config from its default location, or defaults if absent.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&path)
    }

    /// Load the config from `path`; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save the config to its default location.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::config_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save the config to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check field values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.supported_extensions.iter().all(|e| e.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                message: "supported_extensions cannot be empty".to_string(),
            });
        }
        if self.max_new_files == 0 {
            return Err(ConfigError::Invalid {
                message: "max_new_files must be at least 1".to_string(),
            });
        }
        if self.enabled_paths.iter().any(|p| p.as_os_str().is_empty()) {
            return Err(ConfigError::Invalid {
                message: "enabled_paths cannot contain empty paths".to_string(),
            });
        }
        Ok(())
    }

    /// Add a directory to the enabled paths.
    ///
    /// Rejects paths that are not existing directories. Returns `false` if the
    /// path was already enabled.
    pub fn enable_path(&mut self, path: impl Into<PathBuf>) -> Result<bool, ConfigError> {
        let path = path.into();
        if !path.is_dir() {
            return Err(ConfigError::Invalid {
                message: format!("{} is not a directory", path.display()),
            });
        }
        if self.enabled_paths.contains(&path) {
            return Ok(false);
        }
        self.enabled_paths.push(path);
        Ok(true)
    }

    /// Remove a directory from the enabled paths.
    pub fn disable_path(&mut self, path: &Path) -> bool {
        let before = self.enabled_paths.len();
        self.enabled_paths.retain(|p| p != path);
        before != self.enabled_paths.len()
    }

    /// Add a path to the excluded set.
    pub fn exclude_path(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        if self.excluded_paths.contains(&path) {
            return false;
        }
        self.excluded_paths.push(path);
        true
    }

    /// Remove a path from the excluded set.
    pub fn include_path(&mut self, path: &Path) -> bool {
        let before = self.excluded_paths.len();
        self.excluded_paths.retain(|p| p != path);
        before != self.excluded_paths.len()
    }

    /// Enabled paths that are not excluded.
    pub fn effective_enabled_paths(&self) -> Vec<PathBuf> {
        self.enabled_paths
            .iter()
            .filter(|p| !crate::classify::is_excluded(p, &self.excluded_paths))
            .cloned()
            .collect()
    }

    /// Classifier built from the configured extension and noise lists.
    pub fn classifier(&self) -> PathClassifier {
        PathClassifier::new(&self.supported_extensions, &self.noise_directories)
    }

    /// Keyword matcher built from the configured keyword list.
    pub fn keywords(&self) -> MusicKeywords {
        MusicKeywords::new(&self.music_keywords)
    }

    /// Walk settings derived from this config.
    pub fn walk_config(&self) -> WalkConfig {
        WalkConfig {
            max_depth: self.max_depth,
            follow_links: self.follow_links,
            excluded_paths: self.excluded_paths.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_walk_config_builder() {
        let config = WalkConfig::builder()
            .max_depth(4usize)
            .follow_links(false)
            .excluded_paths(vec![PathBuf::from("/mnt/backup")])
            .build()
            .unwrap();

        assert_eq!(config.max_depth, 4);
        assert!(!config.follow_links);
        assert_eq!(config.excluded_paths.len(), 1);
    }

    #[test]
    fn test_walk_config_defaults() {
        let config = WalkConfig::builder().build().unwrap();
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert!(config.follow_links);
        assert_eq!(config.with_max_depth(1).max_depth, 1);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let config = LibraryConfig::load_from(&temp.path().join("absent.toml")).unwrap();
        assert_eq!(config, LibraryConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");

        let mut config = LibraryConfig::default();
        config.locked = true;
        config.excluded_paths.push(PathBuf::from("/mnt/old"));
        config.max_new_files = 25;
        config.save_to(&path).unwrap();

        let loaded = LibraryConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "locked = true\nmax_depth = 4\n").unwrap();

        let config = LibraryConfig::load_from(&path).unwrap();
        assert!(config.locked);
        assert_eq!(config.max_depth, 4);
        assert_eq!(config.max_new_files, DEFAULT_MAX_NEW_FILES);
        assert!(!config.supported_extensions.is_empty());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "max_new_files = 0\n").unwrap();
        assert!(matches!(
            LibraryConfig::load_from(&path),
            Err(ConfigError::Invalid { .. })
        ));

        std::fs::write(&path, "locked = \"yes\"\n").unwrap();
        assert!(matches!(
            LibraryConfig::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_enable_requires_directory() {
        let temp = TempDir::new().unwrap();
        let mut config = LibraryConfig::default();

        assert!(config.enable_path(temp.path()).unwrap());
        assert!(!config.enable_path(temp.path()).unwrap());
        assert!(config.enable_path(temp.path().join("missing")).is_err());
        assert!(config.disable_path(temp.path()));
        assert!(config.enabled_paths.is_empty());
    }

    #[test]
    fn test_excluded_wins_over_enabled() {
        let mut config = LibraryConfig::default();
        config.enabled_paths = vec![PathBuf::from("/music"), PathBuf::from("/music/old")];
        config.exclude_path("/music/old");

        assert_eq!(config.effective_enabled_paths(), vec![PathBuf::from("/music")]);
        assert!(config.include_path(Path::new("/music/old")));
        assert_eq!(config.effective_enabled_paths().len(), 2);
    }
}
