//! Three-phase discovery of music directories.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

use derive_builder::Builder;
use indexmap::IndexSet;
use jwalk::{Parallelism, WalkDir};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use riffshelf_core::{
    DEFAULT_MAX_DEPTH, DiagnosticContext, DiscoveredDirectory, LibraryConfig, MusicKeywords,
    PathClassifier, RootOrigin, ScanError, ScanRoot, ScanWarning, Suggestion, SuggestionReason,
    WalkStats, is_excluded,
};

use crate::guard::BusyGuard;
use crate::locations::{LocationProvider, SystemLocations};
use crate::progress::ScanProgress;
use crate::walker::{DirectoryWalker, WalkOutcome};

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Settings for a discovery run.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct PlannerConfig {
    /// Explicitly configured roots; when empty, standard locations are used.
    #[builder(default)]
    pub scan_directories: Vec<PathBuf>,

    /// Paths never walked or suggested.
    #[builder(default)]
    pub excluded_paths: Vec<PathBuf>,

    /// Walk depth below each root.
    #[builder(default = "DEFAULT_MAX_DEPTH")]
    pub max_depth: usize,

    /// Depth of the keyword search inside broad locations.
    #[builder(default = "3")]
    pub heuristic_depth: usize,

    /// Deepest non-matching directory the keyword search descends into.
    #[builder(default = "2")]
    pub fanout_depth: usize,

    /// Window for "recently modified" suggestions; 0 disables the check.
    #[builder(default = "30")]
    pub recent_window_days: u32,

    /// Maximum number of suggestions returned.
    #[builder(default = "10")]
    pub max_suggestions: usize,

    /// Follow symbolic links while walking roots.
    #[builder(default = "true")]
    pub follow_links: bool,

    /// Lock state reported in diagnostics.
    #[builder(default)]
    pub locked: bool,
}

impl PlannerConfig {
    pub fn builder() -> PlannerConfigBuilder {
        PlannerConfigBuilder::default()
    }

    /// Planner settings from the persistent library configuration.
    pub fn from_library(config: &LibraryConfig) -> Self {
        Self {
            scan_directories: config.effective_enabled_paths(),
            excluded_paths: config.excluded_paths.clone(),
            max_depth: config.max_depth,
            heuristic_depth: config.heuristic_depth,
            fanout_depth: config.fanout_depth,
            recent_window_days: config.recent_window_days,
            max_suggestions: config.max_suggestions,
            follow_links: config.follow_links,
            locked: config.locked,
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self::from_library(&LibraryConfig::default())
    }
}

/// Counts for a discovery run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoverySummary {
    pub root_count: usize,
    pub standard_count: usize,
    pub discovered_count: usize,
    pub suggestion_count: usize,
    pub total_files: u64,
    pub total_size: u64,
    pub warning_count: usize,
}

/// Everything one discovery run found.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryReport {
    /// Roots walked, in order.
    pub roots: Vec<ScanRoot>,
    /// Music directories under configured or standard roots.
    pub standard_directories: Vec<DiscoveredDirectory>,
    /// Music directories found by the keyword search.
    pub discovered_directories: Vec<DiscoveredDirectory>,
    /// Ranked suggestions, recent activity first.
    pub suggested_directories: Vec<Suggestion>,
    /// Candidate files across all directories.
    pub total_files: u64,
    pub stats: WalkStats,
    pub warnings: Vec<ScanWarning>,
    /// Whether the run stopped early because of cancellation.
    pub cancelled: bool,
    pub summary: DiscoverySummary,
    /// Paths of every directory absorbed so far.
    #[serde(skip)]
    seen_directories: IndexSet<PathBuf>,
}

impl DiscoveryReport {
    /// Standard and discovered directories together.
    pub fn all_directories(&self) -> impl Iterator<Item = &DiscoveredDirectory> {
        self.standard_directories
            .iter()
            .chain(self.discovered_directories.iter())
    }

    /// Every candidate file path, in discovery order.
    pub fn file_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.all_directories().flat_map(|d| d.file_paths())
    }

    fn absorb(&mut self, outcome: WalkOutcome, origin: RootOrigin) {
        self.stats.merge(&outcome.stats);
        self.warnings.extend(outcome.warnings);
        self.cancelled |= outcome.cancelled;

        for directory in outcome.directories {
            if !self.seen_directories.insert(directory.path.clone()) {
                continue;
            }
            match origin {
                RootOrigin::Discovered => self.discovered_directories.push(directory),
                _ => self.standard_directories.push(directory),
            }
        }
    }

    fn finalize(&mut self) {
        self.total_files = self.all_directories().map(|d| d.file_count).sum();
        self.summary = DiscoverySummary {
            root_count: self.roots.len(),
            standard_count: self.standard_directories.len(),
            discovered_count: self.discovered_directories.len(),
            suggestion_count: self.suggested_directories.len(),
            total_files: self.total_files,
            total_size: self.all_directories().map(|d| d.total_size).sum(),
            warning_count: self.warnings.len(),
        };
    }
}

/// Composes configured, standard and heuristic locations into a report.
///
/// Only one run may be in flight per planner; a concurrent call fails with
/// [`ScanError::ScannerBusy`].
pub struct DiscoveryPlanner {
    locations: Arc<dyn LocationProvider>,
    keywords: MusicKeywords,
    config: PlannerConfig,
    walker: DirectoryWalker,
    busy: AtomicBool,
}

impl DiscoveryPlanner {
    pub fn new(
        classifier: PathClassifier,
        keywords: MusicKeywords,
        config: PlannerConfig,
        locations: Arc<dyn LocationProvider>,
    ) -> Self {
        let walk_config = riffshelf_core::WalkConfig {
            max_depth: config.max_depth,
            follow_links: config.follow_links,
            excluded_paths: config.excluded_paths.clone(),
        };
        Self {
            locations,
            keywords,
            walker: DirectoryWalker::new(classifier, walk_config),
            config,
            busy: AtomicBool::new(false),
        }
    }

    /// Planner for the running platform, configured from `config`.
    pub fn from_config(config: &LibraryConfig) -> Self {
        Self::new(
            config.classifier(),
            config.keywords(),
            PlannerConfig::from_library(config),
            Arc::new(SystemLocations::new()),
        )
    }

    /// Share a cancellation token with the planner's walks.
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.walker = self.walker.with_cancel_token(cancel);
        self
    }

    /// Publish walk progress on an existing channel.
    pub fn with_progress_sender(mut self, tx: broadcast::Sender<ScanProgress>) -> Self {
        self.walker = self.walker.with_progress_sender(tx);
        self
    }

    /// Subscribe to walk progress.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.walker.subscribe()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        self.walker.cancel_token()
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Whether a run is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Run all three discovery phases.
    pub fn discover_all(&self) -> Result<DiscoveryReport, ScanError> {
        let _guard = BusyGuard::acquire(&self.busy)?;
        let mut context = self.diagnostic_context();

        info!("Starting discovery");
        let result = self.run_phases(&mut context);
        match &result {
            Ok(report) => info!(
                roots = report.summary.root_count,
                directories = report.summary.standard_count + report.summary.discovered_count,
                suggestions = report.summary.suggestion_count,
                files = report.total_files,
                cancelled = report.cancelled,
                "Discovery finished"
            ),
            Err(err) => warn!(context = %context, error = %err, "Discovery failed"),
        }
        result.map_err(|err| err.with_context(context))
    }

    /// Walk only the given roots, skipping the heuristic and suggestion phases.
    pub fn walk_roots(&self, roots: &[ScanRoot]) -> Result<DiscoveryReport, ScanError> {
        let _guard = BusyGuard::acquire(&self.busy)?;

        let mut report = DiscoveryReport::default();
        for root in dedup_roots(roots.iter().cloned()) {
            if self.cancel_token().is_cancelled() {
                report.cancelled = true;
                break;
            }
            if is_excluded(&root.path, &self.config.excluded_paths) {
                debug!(path = %root.path.display(), "Skipping excluded root");
                continue;
            }
            let outcome = self.walker.walk(&root.path);
            report.absorb(outcome, root.origin);
            report.roots.push(root);
        }
        report.finalize();
        Ok(report)
    }

    fn diagnostic_context(&self) -> DiagnosticContext {
        DiagnosticContext::capture(self.locations.home_dir(), self.config.locked)
    }

    fn run_phases(&self, context: &mut DiagnosticContext) -> Result<DiscoveryReport, ScanError> {
        let mut report = DiscoveryReport::default();

        // Phase 1: configured or standard roots.
        for root in self.initial_roots() {
            if self.stop_requested(&mut report) {
                return Ok(report);
            }
            context.attempt(&root.path);
            let outcome = self.walker.walk(&root.path);
            report.absorb(outcome, root.origin);
            report.roots.push(root);
        }

        // Phase 2: keyword search in broad locations.
        let mut empty_keyword_dirs = Vec::new();
        let mut candidates: IndexSet<PathBuf> = IndexSet::new();
        for location in self.locations.broad_locations()? {
            if self.stop_requested(&mut report) {
                return Ok(report);
            }
            if is_excluded(&location, &self.config.excluded_paths) || !location.is_dir() {
                continue;
            }
            context.attempt(&location);
            candidates.extend(self.keyword_search(&location));
        }

        for candidate in candidates {
            if self.stop_requested(&mut report) {
                return Ok(report);
            }
            if report.roots.iter().any(|r| candidate.starts_with(&r.path)) {
                continue;
            }
            context.attempt(&candidate);
            let outcome = self.walker.walk(&candidate);
            let found = outcome.file_count();
            report.absorb(outcome, RootOrigin::Discovered);
            if found == 0 {
                empty_keyword_dirs.push(candidate);
            } else {
                report
                    .roots
                    .push(ScanRoot::new(candidate, RootOrigin::Discovered));
            }
        }

        // Phase 3: suggestions, recent activity first.
        let mut suggestions = self.recent_suggestions(context);
        suggestions.extend(
            empty_keyword_dirs
                .into_iter()
                .map(|path| Suggestion::new(path, SuggestionReason::MusicKeyword, 0)),
        );
        suggestions.truncate(self.config.max_suggestions);
        report.suggested_directories = suggestions;

        report.finalize();
        Ok(report)
    }

    fn stop_requested(&self, report: &mut DiscoveryReport) -> bool {
        if self.cancel_token().is_cancelled() {
            report.cancelled = true;
            report.finalize();
            return true;
        }
        false
    }

    /// Configured roots if any, otherwise standard locations that exist.
    fn initial_roots(&self) -> Vec<ScanRoot> {
        let roots: Vec<ScanRoot> = if self.config.scan_directories.is_empty() {
            self.locations
                .standard_locations()
                .into_iter()
                .filter(|p| p.is_dir())
                .map(|p| ScanRoot::new(p, RootOrigin::Standard))
                .collect()
        } else {
            self.config
                .scan_directories
                .iter()
                .map(|p| ScanRoot::new(p.clone(), RootOrigin::Configured))
                .collect()
        };

        dedup_roots(roots)
            .into_iter()
            .filter(|r| !is_excluded(&r.path, &self.config.excluded_paths))
            .collect()
    }

    /// Shallow search for keyword-named directories below `location`.
    ///
    /// Matching directories are returned and not descended; non-matching ones
    /// are descended only down to `fanout_depth`.
    fn keyword_search(&self, location: &Path) -> Vec<PathBuf> {
        let keywords = self.keywords.clone();
        let classifier = self.walker.classifier().clone();
        let excluded = self.config.excluded_paths.clone();
        let cancel = self.cancel_token().clone();
        let fanout_depth = self.config.fanout_depth;

        let walk = WalkDir::new(location)
            .parallelism(Parallelism::Serial)
            .skip_hidden(true)
            .follow_links(false)
            .max_depth(self.config.heuristic_depth)
            .process_read_dir(move |_depth, _dir_path, _state, children| {
                if cancel.is_cancelled() {
                    children.clear();
                    return;
                }

                children.retain(|result| match result {
                    Ok(entry) => {
                        let name = entry.file_name().to_string_lossy();
                        let noise = entry.depth() > 0 && classifier.is_noise_directory(&name);
                        entry.file_type().is_dir() && !noise && !is_excluded(&entry.path(), &excluded)
                    }
                    Err(_) => false,
                });

                for entry in children.iter_mut().flatten() {
                    let name = entry.file_name().to_string_lossy();
                    if keywords.matches(&name) || entry.depth() > fanout_depth {
                        entry.read_children_path = None;
                    }
                }
            });

        walk.into_iter()
            .flatten()
            .filter(|entry| entry.depth() > 0)
            .filter(|entry| self.keywords.matches(&entry.file_name().to_string_lossy()))
            .map(|entry| entry.path())
            .collect()
    }

    /// Recently modified locations that directly hold candidate files.
    fn recent_suggestions(&self, context: &mut DiagnosticContext) -> Vec<Suggestion> {
        let window = Duration::from_secs(u64::from(self.config.recent_window_days) * SECONDS_PER_DAY);
        let shallow = self.walker.with_max_depth(0);

        let mut suggestions: Vec<Suggestion> = Vec::new();
        for location in self.locations.recent_locations() {
            if is_excluded(&location, &self.config.excluded_paths)
                || suggestions.iter().any(|s| s.path == location)
            {
                continue;
            }
            let metadata = match std::fs::metadata(&location) {
                Ok(m) if m.is_dir() => m,
                Ok(_) => continue,
                Err(err) => {
                    debug!(path = %location.display(), error = %err, "Recent location unavailable");
                    continue;
                }
            };
            if !window.is_zero() && !modified_within(&metadata, window) {
                continue;
            }

            context.attempt(&location);
            let outcome = shallow.walk(&location);
            if outcome.file_count() > 0 {
                suggestions.push(Suggestion::new(
                    location,
                    SuggestionReason::RecentActivity,
                    outcome.file_count(),
                ));
            }
        }
        suggestions
    }
}

/// Whether `metadata` was modified no longer than `window` ago.
///
/// Timestamps in the future count as recent.
fn modified_within(metadata: &std::fs::Metadata, window: Duration) -> bool {
    match metadata.modified() {
        Ok(modified) => SystemTime::now()
            .duration_since(modified)
            .map(|age| age <= window)
            .unwrap_or(true),
        Err(_) => false,
    }
}

fn dedup_roots(roots: impl IntoIterator<Item = ScanRoot>) -> Vec<ScanRoot> {
    let mut seen = HashSet::new();
    roots
        .into_iter()
        .filter(|r| seen.insert(r.path.clone()))
        .collect()
}
