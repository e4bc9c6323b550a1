//! Command-line interface module for datesort.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing and validation
//! - Merging command-line flags with the configuration file
//! - Running the scan and placement phases with console feedback
//! - Mapping failures to process exit codes

use crate::config::{ConfigError, SortConfig};
use crate::output::OutputFormatter;
use crate::placement::{
    Outcome, PlacementAbort, PlacementApplier, PlacementOptions, RunStatistics, TransferMode,
};
use crate::scanner::{DirectoryScanner, ErrorPolicy, ScanError, normalize_path};
use crate::traversal::TraversalCoordinator;
use clap::Parser;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

/// Copy or move every file under a directory into `<year>/<month>` folders.
#[derive(Debug, Clone, Parser)]
#[command(name = "datesort", version, about, long_about = None)]
pub struct Cli {
    /// Directory to sort (scanned recursively)
    #[arg(long = "srcdir", value_name = "DIR")]
    pub source: Option<PathBuf>,

    /// Directory the year/month folders are created in
    #[arg(long = "destdir", value_name = "DIR")]
    pub destination: Option<PathBuf>,

    /// Move files instead of copying them
    #[arg(short = 'm', long = "move")]
    pub move_files: bool,

    /// Overwrite files of the same name at the destination
    #[arg(short = 'f', long = "force")]
    pub force: bool,

    /// Show what would happen without touching any file
    #[arg(long)]
    pub dry_run: bool,

    /// Warn about unreadable directories and files instead of aborting
    #[arg(long)]
    pub skip_unreadable: bool,

    /// Always use modification times, never dates found in file names
    #[arg(long)]
    pub ignore_filename_dates: bool,

    /// Number of directories scanned in parallel
    #[arg(short = 'j', long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Path to a configuration file
    #[arg(short = 'c', long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Errors that end a run, each with its own exit code.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Must specify both --srcdir and --destdir")]
    MissingPaths,

    #[error("Source directory {} is not a directory", path.display())]
    InvalidSource { path: PathBuf },

    #[error("Cannot resolve {}: {source}", path.display())]
    UnresolvablePath { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Scan aborted: {0}")]
    Scan(#[from] ScanError),

    #[error("A file failed to copy or move, aborted: {0}")]
    Placement(#[from] PlacementAbort),
}

impl RunError {
    /// Process exit code: 1 for configuration problems, 2 for a failed
    /// placement, 3 for a failed scan.
    pub fn exit_code(&self) -> u8 {
        match self {
            RunError::MissingPaths
            | RunError::InvalidSource { .. }
            | RunError::UnresolvablePath { .. }
            | RunError::Config(_) => 1,
            RunError::Placement(_) => 2,
            RunError::Scan(_) => 3,
        }
    }
}

/// Fully resolved settings for one run.
#[derive(Debug)]
pub struct SortSettings {
    pub source: PathBuf,
    pub placement: PlacementOptions,
    pub workers: Option<usize>,
    pub error_policy: ErrorPolicy,
    pub config: SortConfig,
}

impl SortSettings {
    /// Validates the command line and merges it over the configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if either path is missing, the source is not a
    /// directory, or the configuration file cannot be loaded.
    pub fn resolve(cli: &Cli) -> Result<Self, RunError> {
        let (Some(source), Some(destination)) = (&cli.source, &cli.destination) else {
            return Err(RunError::MissingPaths);
        };

        if !source.is_dir() {
            return Err(RunError::InvalidSource {
                path: source.clone(),
            });
        }

        let mut config = SortConfig::load(cli.config.as_deref())?;
        if cli.ignore_filename_dates {
            config.dates.use_filename = false;
        }

        let error_policy = if cli.skip_unreadable {
            ErrorPolicy::Skip
        } else {
            config.scan.on_error
        };

        let destination_root =
            normalize_path(destination).map_err(|source| RunError::UnresolvablePath {
                path: destination.clone(),
                source,
            })?;

        Ok(Self {
            source: source.clone(),
            placement: PlacementOptions {
                destination_root,
                mode: if cli.move_files {
                    TransferMode::Move
                } else {
                    TransferMode::Copy
                },
                overwrite_existing: cli.force,
                dry_run: cli.dry_run,
            },
            workers: cli.jobs.or(config.scan.workers),
            error_policy,
            config,
        })
    }
}

/// Runs one sort from parsed command-line arguments.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use datesort::cli::{Cli, run};
///
/// let cli = Cli::parse_from(["datesort", "--srcdir", "/photos/inbox", "--destdir", "/photos/sorted"]);
/// match run(&cli) {
///     Ok(stats) => println!("{} files copied", stats.applied),
///     Err(e) => eprintln!("Error: {}", e),
/// }
/// ```
pub fn run(cli: &Cli) -> Result<RunStatistics, RunError> {
    let settings = SortSettings::resolve(cli)?;
    sort(&settings)
}

/// Scans the source tree and applies the resulting worklist.
pub fn sort(settings: &SortSettings) -> Result<RunStatistics, RunError> {
    let options = &settings.placement;
    OutputFormatter::info(&format!(
        "Sorting {} into {}",
        settings.source.display(),
        options.destination_root.display()
    ));

    let scanner = DirectoryScanner::new(options.destination_root.clone())
        .with_extractor(settings.config.build_extractor()?)
        .with_filters(settings.config.compile_filters()?)
        .with_error_policy(settings.error_policy);
    let mut coordinator = TraversalCoordinator::new(scanner);
    if let Some(workers) = settings.workers {
        coordinator = coordinator.with_workers(workers);
    }

    let spinner = OutputFormatter::create_spinner("Reading directories");
    let report = match coordinator.run_with_observer(&settings.source, &spinner) {
        Ok(report) => {
            spinner.finish_and_clear();
            report
        }
        Err(e) => {
            spinner.abandon();
            return Err(e.into());
        }
    };

    if report.skipped_as_destination {
        OutputFormatter::warning("Source directory is same as destination directory. Ignoring");
    }

    let worklist = report.worklist;
    OutputFormatter::plain(&format!(
        "{} files ready to process ({} directories scanned)",
        worklist.len(),
        report.directories_scanned
    ));

    if options.dry_run {
        OutputFormatter::dry_run_notice("No files will be copied or moved.");
    }
    info!("Placing {} records", worklist.len());

    let pb = OutputFormatter::create_progress_bar(worklist.len() as u64);
    let result = PlacementApplier::apply_with(&worklist, options, |record, outcome| {
        pb.inc(1);
        if options.dry_run {
            let target = record.target_path(&options.destination_root);
            let line = match outcome {
                Outcome::Applied => format!(" - {} → {}", record.name, target.display()),
                Outcome::Skipped => format!(" - {} (exists, skipped)", record.name),
            };
            pb.suspend(|| OutputFormatter::plain(&line));
        }
    });

    match result {
        Ok(stats) => {
            pb.finish_and_clear();
            OutputFormatter::summary_table(&stats, options.mode);
            if options.dry_run {
                OutputFormatter::success("Dry run complete. No files were modified.");
            } else {
                OutputFormatter::success(&format!(
                    "SUCCESS, {} files {}, {} files not copied/ignored",
                    stats.applied,
                    match options.mode {
                        TransferMode::Copy => "copied",
                        TransferMode::Move => "moved",
                    },
                    stats.skipped
                ));
            }
            Ok(stats)
        }
        Err(abort) => {
            pb.abandon();
            OutputFormatter::summary_table(&abort.stats, options.mode);
            Err(abort.into())
        }
    }
}
