use riffshelf_scan::{
    DirectoryWalker, DiscoveryPlanner, LocationProvider, MusicKeywords, PathClassifier,
    PlannerConfig, RootOrigin, ScanError, StaticLocations, SuggestionReason, WalkConfig,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use tempfile::TempDir;

fn walker_with_depth(max_depth: usize) -> DirectoryWalker {
    let config = WalkConfig::builder().max_depth(max_depth).build().unwrap();
    DirectoryWalker::new(PathClassifier::default(), config)
}

fn planner_for(locations: impl LocationProvider + 'static) -> DiscoveryPlanner {
    DiscoveryPlanner::new(
        PathClassifier::default(),
        MusicKeywords::default(),
        PlannerConfig::default(),
        Arc::new(locations),
    )
}

fn nested_dir(root: &Path, levels: usize) -> PathBuf {
    (1..=levels).fold(root.to_path_buf(), |path, level| path.join(format!("d{level}")))
}

#[test]
fn test_noise_directories_are_never_descended() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("node_modules/pkg/assets")).unwrap();
    fs::create_dir_all(root.join("albums")).unwrap();
    fs::write(root.join("node_modules/pkg/assets/ding.mp3"), "x").unwrap();
    fs::write(root.join("albums/song.mp3"), "x").unwrap();

    let outcome = walker_with_depth(10).walk(root);

    assert_eq!(outcome.file_count(), 1);
    assert!(
        outcome
            .file_paths()
            .all(|p| !p.to_string_lossy().contains("node_modules"))
    );
    // root and albums only
    assert_eq!(outcome.stats.dirs_visited, 2);
}

#[test]
fn test_depth_bound() {
    let temp = TempDir::new().unwrap();
    let deepest = nested_dir(temp.path(), 15);
    fs::create_dir_all(&deepest).unwrap();
    fs::write(nested_dir(temp.path(), 12).join("deep.mp3"), "x").unwrap();

    let outcome = walker_with_depth(10).walk(temp.path());
    assert_eq!(outcome.file_count(), 0);
    assert!(outcome.warnings.is_empty());

    fs::write(nested_dir(temp.path(), 10).join("edge.mp3"), "x").unwrap();
    let outcome = walker_with_depth(10).walk(temp.path());
    assert_eq!(outcome.file_count(), 1);
    assert_eq!(outcome.directories[0].path, nested_dir(temp.path(), 10));
}

#[test]
fn test_directory_records_hold_only_their_own_files() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("artist/album")).unwrap();
    fs::write(root.join("artist/single.mp3"), "1").unwrap();
    fs::write(root.join("artist/album/01.flac"), "22").unwrap();
    fs::write(root.join("artist/album/02.flac"), "333").unwrap();
    fs::write(root.join("artist/album/cover.jpg"), "img").unwrap();

    let outcome = walker_with_depth(10).walk(root);

    let mut counts: Vec<(PathBuf, u64, u64)> = outcome
        .directories
        .iter()
        .map(|d| (d.path.clone(), d.file_count, d.total_size))
        .collect();
    counts.sort();

    assert_eq!(
        counts,
        vec![
            (root.join("artist"), 1, 1),
            (root.join("artist/album"), 2, 5),
        ]
    );
}

#[cfg(unix)]
#[test]
fn test_unreadable_directory_is_skipped() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let locked = root.join("locked");
    fs::create_dir_all(&locked).unwrap();
    fs::create_dir_all(root.join("open")).unwrap();
    fs::write(locked.join("hidden.mp3"), "x").unwrap();
    fs::write(root.join("open/visible.mp3"), "x").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    let readable = fs::read_dir(&locked).is_ok();
    let outcome = walker_with_depth(10).walk(root);

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    assert!(
        outcome
            .file_paths()
            .any(|p| p == &root.join("open/visible.mp3"))
    );
    if !readable {
        assert_eq!(outcome.file_count(), 1);
        assert!(!outcome.warnings.is_empty());
    }
}

#[cfg(unix)]
#[test]
fn test_symlink_cycle_reads_each_directory_once() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("library");
    fs::create_dir_all(root.join("rock")).unwrap();
    fs::write(root.join("rock/riff.mp3"), "x").unwrap();
    std::os::unix::fs::symlink(&root, root.join("rock/loop")).unwrap();

    let outcome = walker_with_depth(10).walk(&root);

    assert_eq!(outcome.file_count(), 1);
    assert_eq!(outcome.directories.len(), 1);
}

#[test]
fn test_cancelled_planner_returns_partial_report() {
    let temp = TempDir::new().unwrap();
    let music = temp.path().join("Music");
    fs::create_dir_all(&music).unwrap();
    fs::write(music.join("a.mp3"), "x").unwrap();

    let planner = planner_for(StaticLocations::new(temp.path()).with_standard([music]));
    planner.cancel_token().cancel();

    let report = planner.discover_all().unwrap();
    assert!(report.cancelled);
    assert_eq!(report.total_files, 0);
    assert!(!planner.is_busy());
}

#[test]
fn test_three_phase_discovery() {
    let temp = TempDir::new().unwrap();
    let home = temp.path().join("home");
    fs::create_dir_all(home.join("Stuff/MyMusic")).unwrap();
    fs::create_dir_all(home.join("Projects/deep/more/Tunes")).unwrap();
    fs::create_dir_all(home.join("Soundtracks")).unwrap();
    fs::create_dir_all(home.join("node_modules/music")).unwrap();
    fs::create_dir_all(home.join("Downloads")).unwrap();
    fs::write(home.join("Stuff/MyMusic/a.mp3"), "x").unwrap();
    fs::write(home.join("Projects/deep/more/Tunes/b.mp3"), "x").unwrap();
    fs::write(home.join("node_modules/music/c.mp3"), "x").unwrap();
    fs::write(home.join("Downloads/d.mp3"), "x").unwrap();

    let locations = StaticLocations::new(&home)
        .with_recent([home.join("Downloads")])
        .with_broad([home.clone()]);
    let report = planner_for(locations).discover_all().unwrap();

    assert_eq!(report.roots.len(), 1);
    assert_eq!(report.roots[0].path, home.join("Stuff/MyMusic"));
    assert_eq!(report.roots[0].origin, RootOrigin::Discovered);
    assert_eq!(report.discovered_directories.len(), 1);
    assert_eq!(report.total_files, 1);

    let suggestions: Vec<(PathBuf, SuggestionReason)> = report
        .suggested_directories
        .iter()
        .map(|s| (s.path.clone(), s.reason))
        .collect();
    assert_eq!(
        suggestions,
        vec![
            (home.join("Downloads"), SuggestionReason::RecentActivity),
            (home.join("Soundtracks"), SuggestionReason::MusicKeyword),
        ]
    );
    assert_eq!(report.suggested_directories[0].confidence, 0.8);
    assert_eq!(report.suggested_directories[1].confidence, 0.6);
}

#[test]
fn test_keyword_matches_under_standard_roots_are_not_rewalked() {
    let temp = TempDir::new().unwrap();
    let home = temp.path().join("home");
    let music = home.join("Music");
    fs::create_dir_all(music.join("albums")).unwrap();
    fs::write(music.join("albums/a.mp3"), "x").unwrap();

    let locations = StaticLocations::new(&home)
        .with_standard([music.clone()])
        .with_broad([home.clone()]);
    let report = planner_for(locations).discover_all().unwrap();

    assert_eq!(report.roots.len(), 1);
    assert_eq!(report.roots[0].origin, RootOrigin::Standard);
    assert_eq!(report.standard_directories.len(), 1);
    assert!(report.discovered_directories.is_empty());
    assert_eq!(report.total_files, 1);
}

struct GatedLocations {
    inner: StaticLocations,
    entered: Barrier,
    release: Barrier,
}

impl LocationProvider for GatedLocations {
    fn home_dir(&self) -> Option<PathBuf> {
        self.inner.home_dir()
    }

    fn standard_locations(&self) -> Vec<PathBuf> {
        self.inner.standard_locations()
    }

    fn recent_locations(&self) -> Vec<PathBuf> {
        self.inner.recent_locations()
    }

    fn broad_locations(&self) -> Result<Vec<PathBuf>, ScanError> {
        self.entered.wait();
        self.release.wait();
        self.inner.broad_locations()
    }
}

#[test]
fn test_concurrent_discovery_is_rejected() {
    let temp = TempDir::new().unwrap();
    let gated = Arc::new(GatedLocations {
        inner: StaticLocations::new(temp.path()),
        entered: Barrier::new(2),
        release: Barrier::new(2),
    });
    let planner = Arc::new(DiscoveryPlanner::new(
        PathClassifier::default(),
        MusicKeywords::default(),
        PlannerConfig::default(),
        gated.clone(),
    ));

    let running = {
        let planner = Arc::clone(&planner);
        std::thread::spawn(move || planner.discover_all())
    };

    gated.entered.wait();
    assert!(planner.is_busy());
    let second = planner.discover_all();
    assert!(matches!(second, Err(ScanError::ScannerBusy)));
    gated.release.wait();

    assert!(running.join().unwrap().is_ok());
    assert!(!planner.is_busy());
}

struct FailingLocations {
    inner: StaticLocations,
    fail: AtomicBool,
}

impl LocationProvider for FailingLocations {
    fn home_dir(&self) -> Option<PathBuf> {
        self.inner.home_dir()
    }

    fn standard_locations(&self) -> Vec<PathBuf> {
        self.inner.standard_locations()
    }

    fn recent_locations(&self) -> Vec<PathBuf> {
        self.inner.recent_locations()
    }

    fn broad_locations(&self) -> Result<Vec<PathBuf>, ScanError> {
        if self.fail.swap(false, Ordering::SeqCst) {
            return Err(ScanError::Location {
                message: "volumes unavailable".into(),
            });
        }
        self.inner.broad_locations()
    }
}

#[test]
fn test_failure_mid_run_clears_busy_flag() {
    let temp = TempDir::new().unwrap();
    let music = temp.path().join("Music");
    fs::create_dir_all(&music).unwrap();
    fs::write(music.join("a.mp3"), "x").unwrap();

    let planner = planner_for(FailingLocations {
        inner: StaticLocations::new(temp.path()).with_standard([music.clone()]),
        fail: AtomicBool::new(true),
    });

    let err = planner.discover_all().unwrap_err();
    match err {
        ScanError::Discovery { context, source } => {
            assert!(context.attempted.contains(&music));
            assert_eq!(context.home.as_deref(), Some(temp.path()));
            assert_eq!(context.platform, std::env::consts::OS);
            assert!(matches!(*source, ScanError::Location { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!planner.is_busy());

    let report = planner.discover_all().unwrap();
    assert_eq!(report.total_files, 1);
}
