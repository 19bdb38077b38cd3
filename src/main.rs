//! riffshelf - find the music on your disks and keep a practice catalog in sync.
//!
//! Usage:
//!   riffshelf discover          Show music directories and suggestions
//!   riffshelf walk PATH         List music directories below PATH
//!   riffshelf scan              Update the catalog from the library
//!   riffshelf config show       Show the configuration
//!   riffshelf --help            Show help

mod logging;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, eyre};
use tracing::debug;

use riffshelf_catalog::ScanRunResult;
use riffshelf_core::LibraryConfig;
use riffshelf_library::{LibraryEvent, LibraryScanner, ScanReport, start_library_scan};
use riffshelf_scan::{DirectoryWalker, DiscoveryPlanner, DiscoveryReport, WalkOutcome};

#[derive(Parser)]
#[command(
    name = "riffshelf",
    version,
    about = "Music library discovery and incremental scanning",
    long_about = "riffshelf finds the directories that hold your music and keeps a \
                  catalog of tracks in sync with them.\n\n\
                  The first successful scan locks the library to its enabled paths; \
                  run `riffshelf config unlock` to allow full discovery again."
)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Find music directories and suggestions without touching the catalog
    Discover {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List music directories below a path
    Walk {
        /// Directory to walk
        path: PathBuf,

        /// Maximum directory depth below the path
        #[arg(short, long)]
        depth: Option<usize>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Discover files and update the catalog
    Scan {
        /// Catalog file (overrides the configured location)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Maximum new files to process in this run
        #[arg(short = 'n', long)]
        max_new: Option<usize>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show or edit the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the configuration
    Show,
    /// Print the configuration file location
    Path,
    /// Restrict scans to enabled paths
    Lock,
    /// Allow full discovery on the next scan
    Unlock,
    /// Add a directory to the enabled paths
    Enable { path: PathBuf },
    /// Remove a directory from the enabled paths
    Disable { path: PathBuf },
    /// Never scan a path
    Exclude { path: PathBuf },
    /// Remove a path from the excluded set
    Include { path: PathBuf },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    logging::init_logger(cli.verbose);

    let config_path = match cli.config {
        Some(path) => path,
        None => LibraryConfig::config_path()
            .ok_or_else(|| eyre!("No configuration directory available; pass --config"))?,
    };
    let config = LibraryConfig::load_from(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    debug!(path = %config_path.display(), locked = config.locked, "Loaded configuration");

    match cli.command {
        Command::Discover { format } => run_discover(&config, format)?,
        Command::Walk {
            path,
            depth,
            format,
        } => run_walk(&config, &path, depth, format)?,
        Command::Scan {
            catalog,
            max_new,
            format,
        } => run_scan(config, &config_path, catalog, max_new, format).await?,
        Command::Config { action } => run_config(config, &config_path, action)?,
    }

    Ok(())
}

/// Run discovery and display the report.
fn run_discover(config: &LibraryConfig, format: OutputFormat) -> Result<()> {
    eprintln!("Discovering music directories...");

    let planner = DiscoveryPlanner::from_config(config);
    let report = planner.discover_all().context("Discovery failed")?;

    match format {
        OutputFormat::Text => print_discovery(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(())
}

/// Walk one directory and list what it holds.
fn run_walk(
    config: &LibraryConfig,
    path: &Path,
    depth: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let path = path.canonicalize().context("Invalid path")?;
    let walk_config = config
        .walk_config()
        .with_max_depth(depth.unwrap_or(config.max_depth));

    eprintln!("Walking {}...", path.display());

    let walker = DirectoryWalker::new(config.classifier(), walk_config);
    let outcome = walker.walk(&path);

    match format {
        OutputFormat::Text => print_walk(&outcome),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&outcome.directories)?)
        }
    }

    Ok(())
}

/// Run a library scan with live progress on stderr.
async fn run_scan(
    stored: LibraryConfig,
    config_path: &Path,
    catalog: Option<PathBuf>,
    max_new: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let mut config = stored.clone();
    if let Some(catalog) = catalog {
        config.catalog_path = Some(catalog);
    }
    if let Some(max_new) = max_new {
        config.max_new_files = max_new;
    }
    config.validate().context("Invalid scan options")?;

    let scanner = Arc::new(LibraryScanner::open(config).context("Failed to open catalog")?);

    let mut rx = start_library_scan(Arc::clone(&scanner));
    let mut outcome = None;
    while let Some(event) = rx.recv().await {
        match event {
            LibraryEvent::Progress(progress) => {
                eprint!(
                    "\r{} directories, {} files ",
                    progress.dirs_scanned, progress.files_found
                );
                let _ = std::io::stderr().flush();
            }
            LibraryEvent::Complete(result) => outcome = Some(result),
        }
    }
    eprintln!();

    let report = outcome
        .ok_or_else(|| eyre!("Scan ended without a result"))?
        .context("Scan failed")?;

    // Persist the lock and adopted roots without the one-off overrides.
    let snapshot = scanner.config_snapshot();
    if snapshot.locked != stored.locked || snapshot.enabled_paths != stored.enabled_paths {
        LibraryConfig {
            locked: snapshot.locked,
            enabled_paths: snapshot.enabled_paths,
            ..stored
        }
        .save_to(config_path)
        .context("Failed to save configuration")?;
    }

    match format {
        OutputFormat::Text => print_scan(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(())
}

/// Show or edit the configuration file.
fn run_config(mut config: LibraryConfig, config_path: &Path, action: ConfigAction) -> Result<()> {
    let is_query = matches!(action, ConfigAction::Show | ConfigAction::Path);
    let changed = match action {
        ConfigAction::Show => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            false
        }
        ConfigAction::Path => {
            println!("{}", config_path.display());
            false
        }
        ConfigAction::Lock => !std::mem::replace(&mut config.locked, true),
        ConfigAction::Unlock => std::mem::replace(&mut config.locked, false),
        ConfigAction::Enable { path } => {
            let path = path.canonicalize().context("Invalid path")?;
            config.enable_path(path).context("Cannot enable path")?
        }
        ConfigAction::Disable { path } => config.disable_path(&absolute(&path)),
        ConfigAction::Exclude { path } => config.exclude_path(absolute(&path)),
        ConfigAction::Include { path } => config.include_path(&absolute(&path)),
    };

    if changed {
        config
            .save_to(config_path)
            .context("Failed to save configuration")?;
        eprintln!("Saved {}", config_path.display());
    } else if !is_query {
        eprintln!("No change");
    }

    Ok(())
}

/// Absolute form of `path`, without requiring it to exist.
fn absolute(path: &Path) -> PathBuf {
    path.canonicalize()
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn print_discovery(report: &DiscoveryReport) {
    println!();
    println!("{}", "─".repeat(70));
    println!(" Discovery Report");
    println!("{}", "─".repeat(70));
    println!();

    if report.roots.is_empty() {
        println!(" No music roots found.");
    } else {
        println!(" Roots:");
        for root in &report.roots {
            let origin = format!("[{}]", root.origin);
            println!("   {origin:<13} {}", root.path.display());
        }
    }
    println!();

    let directories: Vec<_> = report.all_directories().collect();
    if !directories.is_empty() {
        println!(" Music directories:");
        for dir in directories {
            println!(
                "   {:>5} files  {:>10}  {}",
                dir.file_count,
                format_size(dir.total_size),
                dir.path.display()
            );
        }
        println!();
    }

    if !report.suggested_directories.is_empty() {
        println!(" Suggestions:");
        for suggestion in &report.suggested_directories {
            println!(
                "   {:.1}  {:>5} files  {}",
                suggestion.confidence,
                suggestion.file_count,
                suggestion.path.display()
            );
        }
        println!();
    }

    println!(
        " {} files in {} directories, {}",
        report.total_files,
        report.summary.standard_count + report.summary.discovered_count,
        format_size(report.summary.total_size)
    );
    print_warnings(report.warnings.len(), report.cancelled);
}

fn print_walk(outcome: &WalkOutcome) {
    println!();
    for dir in &outcome.directories {
        println!(
            " {:>5} files  {:>10}  {}",
            dir.file_count,
            format_size(dir.total_size),
            dir.path.display()
        );
    }
    println!();
    println!(
        " {} files in {} directories ({} visited)",
        outcome.file_count(),
        outcome.directories.len(),
        outcome.stats.dirs_visited
    );
    if let Some((path, size)) = &outcome.stats.largest_file {
        println!(" Largest: {} ({})", path.display(), format_size(*size));
    }
    print_warnings(outcome.warnings.len(), outcome.cancelled);
}

fn print_scan(report: &ScanReport) {
    let r: &ScanRunResult = &report.result;

    println!();
    println!("{}", "─".repeat(60));
    println!(" Library Scan");
    println!("{}", "─".repeat(60));
    if report.cancelled {
        println!(" Cancelled before the catalog was updated.");
        return;
    }
    println!(" Discovered:        {:>8}", r.discovered);
    println!(" Already catalogued:{:>8}", r.existing_count);
    println!(" New:               {:>8}", r.new_count);
    println!(" Added this run:    {:>8}", r.processed);
    println!(" Restored:          {:>8}", r.restored_ids.len());
    println!(" Removed (missing): {:>8}", r.removed_missing_count);
    println!(" Removed (excluded):{:>8}", r.removed_excluded_count);
    println!(" Skipped (excluded):{:>8}", r.excluded_skipped_count);
    println!(" Scanned in {:.2}s", report.duration.as_secs_f64());
    println!("{}", "─".repeat(60));

    if r.truncated {
        println!();
        println!(
            " {} new files remain; run `riffshelf scan` again to continue.",
            r.remaining_count
        );
    }
    print_warnings(report.discovery.warnings.len(), false);
}

fn print_warnings(count: usize, cancelled: bool) {
    if count > 0 {
        println!();
        println!("{count} warning(s) during scan (use -v for details)");
    }
    if cancelled {
        println!("Scan was cancelled; results are partial.");
    }
}

/// Format bytes as human-readable size.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}
