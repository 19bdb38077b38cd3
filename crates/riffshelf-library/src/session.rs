//! Library scan session: discovery, reconciliation and catalog updates.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use riffshelf_catalog::{
    CatalogBatch, CatalogStore, JsonCatalog, MetadataExtractor, ReconcileConfig, Reconciler, ScanRunResult,
    TagExtractor, extract_batch,
};
use riffshelf_core::{DiagnosticContext, LibraryConfig, RootOrigin, ScanRoot};
use riffshelf_scan::{
    BusyGuard, DiscoveryPlanner, DiscoveryReport, LocationProvider, PROGRESS_CHANNEL_SIZE,
    PlannerConfig, ScanProgress, SystemLocations,
};

use crate::error::LibraryError;

/// Outcome of one library scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub discovery: DiscoveryReport,
    pub result: ScanRunResult,
    /// Lock state after the run.
    pub locked: bool,
    /// The run was cancelled before the catalog was touched.
    pub cancelled: bool,
    pub duration: Duration,
}

/// Owns everything one library scan needs.
///
/// Only one run may be in flight at a time. The first successful run on an
/// unlocked library adopts the roots it walked as enabled paths and engages
/// the lock; from then on only enabled paths are scanned until
/// [`unlock`](Self::unlock) is called.
pub struct LibraryScanner<S: CatalogStore> {
    config: LibraryConfig,
    locations: Arc<dyn LocationProvider>,
    reconciler: Reconciler,
    extractor: Arc<dyn MetadataExtractor>,
    store: Mutex<S>,
    busy: AtomicBool,
    locked: AtomicBool,
    enabled_paths: Mutex<Vec<PathBuf>>,
    current_run: Mutex<Option<CancellationToken>>,
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl LibraryScanner<JsonCatalog> {
    /// Session backed by the JSON catalog named in `config`.
    pub fn open(config: LibraryConfig) -> Result<Self, LibraryError> {
        let path = config
            .catalog_path
            .clone()
            .or_else(LibraryConfig::default_catalog_path)
            .ok_or_else(|| LibraryError::InvalidConfig {
                message: "no catalog path configured and no data directory available".into(),
            })?;
        let store = JsonCatalog::open(path)?;
        Ok(Self::new(config, store))
    }
}

impl<S: CatalogStore> LibraryScanner<S> {
    pub fn new(config: LibraryConfig, store: S) -> Self {
        let (progress_tx, _) = broadcast::channel(PROGRESS_CHANNEL_SIZE);
        let reconciler = Reconciler::new(ReconcileConfig {
            max_new_files: config.max_new_files,
        });
        Self {
            locked: AtomicBool::new(config.locked),
            enabled_paths: Mutex::new(config.enabled_paths.clone()),
            config,
            locations: Arc::new(SystemLocations::new()),
            reconciler,
            extractor: Arc::new(TagExtractor::default()),
            store: Mutex::new(store),
            busy: AtomicBool::new(false),
            current_run: Mutex::new(None),
            progress_tx,
        }
    }

    /// Replace the platform location source.
    pub fn with_locations(mut self, locations: Arc<dyn LocationProvider>) -> Self {
        self.locations = locations;
        self
    }

    /// Replace the metadata extractor.
    pub fn with_extractor(mut self, extractor: Arc<dyn MetadataExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    /// The configuration with the current lock state and enabled paths
    /// applied, for saving.
    pub fn config_snapshot(&self) -> LibraryConfig {
        LibraryConfig {
            locked: self.is_locked(),
            enabled_paths: self.enabled_paths(),
            ..self.config.clone()
        }
    }

    /// Enabled paths, including roots adopted when the lock was engaged.
    pub fn enabled_paths(&self) -> Vec<PathBuf> {
        self.enabled_paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Subscribe to walk progress of every run.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    pub fn is_scanning(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// Allow full discovery again on the next run.
    pub fn unlock(&self) {
        if self.locked.swap(false, Ordering::AcqRel) {
            info!("Library unlocked");
        }
    }

    /// Ask the in-flight run to stop. Returns `false` if nothing is running.
    pub fn cancel(&self) -> bool {
        match self.current_run.lock() {
            Ok(guard) => match guard.as_ref() {
                Some(token) => {
                    token.cancel();
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    /// Run access to the store, e.g. to inspect or edit the catalog between
    /// runs.
    pub fn with_store<R>(&self, f: impl FnOnce(&mut S) -> R) -> Result<R, LibraryError> {
        let mut store = self.lock_store()?;
        Ok(f(&mut store))
    }

    /// Discover, reconcile and update the catalog.
    pub fn run(&self) -> Result<ScanReport, LibraryError> {
        let _guard = BusyGuard::acquire(&self.busy)?;
        let started = Instant::now();
        let locked = self.is_locked();
        let mut context = DiagnosticContext::capture(self.locations.home_dir(), locked);

        let cancel = CancellationToken::new();
        self.set_current_run(Some(cancel.clone()));
        let result = self.run_once(locked, cancel, &mut context);
        self.set_current_run(None);

        match result {
            Ok(mut report) => {
                report.duration = started.elapsed();
                info!(
                    discovered = report.result.discovered,
                    processed = report.result.processed,
                    restored = report.result.restored_ids.len(),
                    removed_missing = report.result.removed_missing_count,
                    removed_excluded = report.result.removed_excluded_count,
                    remaining = report.result.remaining_count,
                    cancelled = report.cancelled,
                    "Library scan finished"
                );
                Ok(report)
            }
            Err(err) => {
                warn!(context = %context, error = %err, "Library scan failed");
                Err(err.with_context(context))
            }
        }
    }

    fn run_once(
        &self,
        locked: bool,
        cancel: CancellationToken,
        context: &mut DiagnosticContext,
    ) -> Result<ScanReport, LibraryError> {
        let config = self.config_snapshot();
        let planner = DiscoveryPlanner::new(
            config.classifier(),
            config.keywords(),
            PlannerConfig {
                locked,
                ..PlannerConfig::from_library(&config)
            },
            Arc::clone(&self.locations),
        )
        .with_cancel_token(cancel)
        .with_progress_sender(self.progress_tx.clone());

        let discovery = if locked {
            let roots = config.effective_enabled_paths();
            if roots.is_empty() {
                return Err(LibraryError::InvalidConfig {
                    message: "library is locked but no enabled paths are configured".into(),
                });
            }
            let roots: Vec<ScanRoot> = roots
                .into_iter()
                .inspect(|p| context.attempt(p))
                .map(|p| ScanRoot::new(p, RootOrigin::Configured))
                .collect();
            planner.walk_roots(&roots)?
        } else {
            planner.discover_all()?
        };
        for root in &discovery.roots {
            context.attempt(&root.path);
        }

        if discovery.cancelled {
            info!("Library scan cancelled before reconciliation");
            return Ok(ScanReport {
                discovery,
                result: ScanRunResult::default(),
                locked,
                cancelled: true,
                duration: Duration::ZERO,
            });
        }

        let files: Vec<PathBuf> = discovery.file_paths().cloned().collect();
        let plan = {
            let store = self.lock_store()?;
            self.reconciler
                .reconcile(&files, &*store, &config.excluded_paths, Path::exists)?
        };

        let records = extract_batch(self.extractor.as_ref(), &plan.to_process);

        let mut result = plan.to_result();
        let applied = self.lock_store()?.apply_batch(CatalogBatch {
            insert: records,
            restore: plan.restore.clone(),
            retire: plan.retirements(),
        })?;
        result.processed = applied.inserted.len();

        if !locked {
            self.engage_lock(&discovery);
        }

        Ok(ScanReport {
            discovery,
            result,
            locked: self.is_locked(),
            cancelled: false,
            duration: Duration::ZERO,
        })
    }

    /// Adopt the walked roots as enabled paths and lock the library.
    ///
    /// With no roots at all there is nothing to restrict scans to, so the
    /// library stays unlocked.
    fn engage_lock(&self, discovery: &DiscoveryReport) {
        let mut enabled = self
            .enabled_paths
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for root in &discovery.roots {
            if !enabled.contains(&root.path) {
                enabled.push(root.path.clone());
            }
        }
        if enabled.is_empty() {
            info!("No roots found; library stays unlocked");
            return;
        }
        self.locked.store(true, Ordering::Release);
        info!(enabled = enabled.len(), "Library locked after first successful scan");
    }

    fn lock_store(&self) -> Result<MutexGuard<'_, S>, LibraryError> {
        self.store.lock().map_err(|_| LibraryError::StorePoisoned)
    }

    fn set_current_run(&self, token: Option<CancellationToken>) {
        if let Ok(mut current) = self.current_run.lock() {
            *current = token;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riffshelf_scan::StaticLocations;
    use std::fs;
    use tempfile::TempDir;

    fn scanner(config: LibraryConfig) -> LibraryScanner<JsonCatalog> {
        LibraryScanner::new(config, JsonCatalog::in_memory())
            .with_locations(Arc::new(StaticLocations::default()))
    }

    #[test]
    fn test_locked_without_enabled_paths_is_rejected() {
        let config = LibraryConfig {
            locked: true,
            ..Default::default()
        };
        let session = scanner(config);

        let err = session.run().unwrap_err();
        assert!(matches!(err, LibraryError::InvalidConfig { .. }));
        assert!(!session.is_scanning());
    }

    #[test]
    fn test_first_run_engages_lock() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.mp3"), "x").unwrap();
        let config = LibraryConfig {
            enabled_paths: vec![temp.path().to_path_buf()],
            ..Default::default()
        };
        let session = scanner(config);
        assert!(!session.is_locked());

        let report = session.run().unwrap();
        assert!(report.locked);
        assert!(session.is_locked());
        assert!(session.config_snapshot().locked);
        assert_eq!(report.result.processed, 1);

        session.unlock();
        assert!(!session.is_locked());
    }

    #[test]
    fn test_lock_adopts_discovered_roots() {
        let temp = TempDir::new().unwrap();
        let music = temp.path().join("Music");
        fs::create_dir_all(&music).unwrap();
        fs::write(music.join("a.mp3"), "x").unwrap();
        let locations = StaticLocations::new(temp.path()).with_standard([music.clone()]);
        let session = LibraryScanner::new(LibraryConfig::default(), JsonCatalog::in_memory())
            .with_locations(Arc::new(locations));

        session.run().unwrap();
        assert!(session.is_locked());
        assert_eq!(session.enabled_paths(), vec![music.clone()]);
        assert_eq!(session.config_snapshot().enabled_paths, vec![music]);
    }

    #[test]
    fn test_nothing_found_stays_unlocked() {
        let session = scanner(LibraryConfig::default());
        let report = session.run().unwrap();

        assert!(!report.locked);
        assert!(!session.is_locked());
        assert!(session.run().is_ok());
    }

    #[test]
    fn test_cancel_without_run() {
        let session = scanner(LibraryConfig::default());
        assert!(!session.cancel());
    }
}
