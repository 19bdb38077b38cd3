//! Name-based classification of filesystem entries.

use std::collections::HashSet;
use std::path::Path;

/// Audio formats recognized when no configuration overrides them.
pub const DEFAULT_EXTENSIONS: &[&str] = &["mp3", "m4a", "wav", "flac", "ogg", "wma"];

/// Directory name fragments that are never descended into.
///
/// Matching is a case-insensitive substring test, so this list is
/// intentionally short.
pub const DEFAULT_NOISE_DIRECTORIES: &[&str] = &[
    // Version control
    ".git",
    ".svn",
    ".hg",
    // Package managers and toolchains
    "node_modules",
    ".npm",
    ".cargo",
    ".rustup",
    "__pycache__",
    "site-packages",
    ".gradle",
    ".m2",
    // Caches and temp
    ".cache",
    "tmp",
    "temp",
    ".trash",
    "$recycle.bin",
    // Operating system
    "system volume information",
    "windows",
    "program files",
    "programdata",
    "appdata",
    "application support",
];

/// Keywords that suggest a directory holds music.
pub const DEFAULT_MUSIC_KEYWORDS: &[&str] = &[
    "music",
    "mp3",
    "audio",
    "songs",
    "tracks",
    "albums",
    "itunes",
    "playlist",
    "guitar",
    "backing",
    "soundtrack",
    "flac",
];

/// Decides whether entries are candidate audio files or noise directories.
#[derive(Debug, Clone)]
pub struct PathClassifier {
    extensions: HashSet<String>,
    noise: Vec<String>,
}

impl PathClassifier {
    /// Create a classifier from extension and noise-directory lists.
    ///
    /// Both lists are normalized to lowercase; extensions may be given with or
    /// without a leading dot.
    pub fn new<E, N>(extensions: E, noise_directories: N) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        N: IntoIterator,
        N::Item: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        let noise = noise_directories
            .into_iter()
            .map(|name| name.as_ref().to_lowercase())
            .filter(|name| !name.is_empty())
            .collect();

        Self { extensions, noise }
    }

    /// True iff the lowercased extension of `name` is a supported format.
    pub fn is_candidate_file(&self, name: &str) -> bool {
        Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.contains(&ext.to_lowercase()))
    }

    /// True iff `name` contains any denylisted fragment, ignoring case.
    pub fn is_noise_directory(&self, name: &str) -> bool {
        let lowered = name.to_lowercase();
        self.noise.iter().any(|fragment| lowered.contains(fragment.as_str()))
    }

    /// Supported extensions, lowercase and without dots.
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }
}

impl Default for PathClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS, DEFAULT_NOISE_DIRECTORIES)
    }
}

/// Case-insensitive keyword matcher for "music-like" directory names.
#[derive(Debug, Clone)]
pub struct MusicKeywords {
    keywords: Vec<String>,
}

impl MusicKeywords {
    /// Create a matcher from a keyword list.
    pub fn new<I>(keywords: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// True if `name` contains any keyword.
    pub fn matches(&self, name: &str) -> bool {
        let lowered = name.to_lowercase();
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }

    /// Whether the matcher has no keywords at all.
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}

impl Default for MusicKeywords {
    fn default() -> Self {
        Self::new(DEFAULT_MUSIC_KEYWORDS)
    }
}

/// True if `path` equals or lies beneath any of `excluded`.
///
/// Comparison is component-wise, so `/music` excludes `/music/a.mp3` but not
/// `/musicals/a.mp3`.
pub fn is_excluded<P: AsRef<Path>>(path: &Path, excluded: &[P]) -> bool {
    excluded.iter().any(|prefix| path.starts_with(prefix.as_ref()))
}
