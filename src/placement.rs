/// Placement of records into the `<year>/<month>` destination layout.
///
/// This module copies or moves every record of a worklist into its bucket
/// folder under the destination root. Folders are created on demand, files
/// already present at the target are skipped unless overwriting is enabled,
/// and the first I/O failure stops the whole run.
use crate::scanner::FileRecord;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Whether records are copied or moved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransferMode {
    /// The source file stays where it is.
    #[default]
    Copy,
    /// The source file is removed once it is in place.
    Move,
}

impl TransferMode {
    fn verb(self) -> &'static str {
        match self {
            TransferMode::Copy => "copy",
            TransferMode::Move => "move",
        }
    }
}

/// How the worklist is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementOptions {
    /// Root under which `<year>/<month>` folders are created.
    pub destination_root: PathBuf,
    /// Copy or move.
    pub mode: TransferMode,
    /// Replace same-named files at the target instead of skipping them.
    pub overwrite_existing: bool,
    /// Work out every outcome without touching the filesystem.
    pub dry_run: bool,
}

impl PlacementOptions {
    /// Copy mode, no overwriting, no dry run.
    pub fn new(destination_root: impl Into<PathBuf>) -> Self {
        Self {
            destination_root: destination_root.into(),
            mode: TransferMode::Copy,
            overwrite_existing: false,
            dry_run: false,
        }
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStatistics {
    /// Records in the worklist.
    pub candidates: usize,
    /// Records copied or moved.
    pub applied: usize,
    /// Records left alone because the target already existed.
    pub skipped: usize,
}

/// What happened to a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Copied or moved (or would be, in a dry run).
    Applied,
    /// Target already exists and overwriting is disabled, or the file is
    /// already at its target.
    Skipped,
}

/// Errors that stop the placement phase.
#[derive(Debug, Error)]
pub enum PlacementError {
    /// The `<year>/<month>` folder could not be created.
    #[error("Failed to create directory {}: {source}", path.display())]
    DestinationSetup { path: PathBuf, source: io::Error },

    /// The copy or move itself failed.
    #[error(
        "Failed to {} {} to {}: {source_error}",
        mode.verb(),
        source_path.display(),
        destination.display()
    )]
    Transfer {
        source_path: PathBuf,
        destination: PathBuf,
        mode: TransferMode,
        #[source]
        source_error: io::Error,
    },
}

/// A placement run that stopped early, with the tallies reached so far.
///
/// Records applied before the failure are not rolled back.
#[derive(Debug, Error)]
#[error(
    "{error} ({} applied, {} skipped of {} candidates before aborting)",
    stats.applied,
    stats.skipped,
    stats.candidates
)]
pub struct PlacementAbort {
    pub stats: RunStatistics,
    #[source]
    pub error: PlacementError,
}

/// Result type for placement operations.
pub type PlacementResult<T> = Result<T, PlacementError>;

/// Applies a worklist to the destination tree.
pub struct PlacementApplier;

impl PlacementApplier {
    /// Places every record of `worklist` according to `options`.
    ///
    /// # Errors
    ///
    /// Stops at the first record that fails and returns a [`PlacementAbort`]
    /// carrying the tallies up to that point.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use datesort::placement::{PlacementApplier, PlacementOptions};
    ///
    /// let options = PlacementOptions::new("/path/to/sorted");
    /// match PlacementApplier::apply(&[], &options) {
    ///     Ok(stats) => println!("{} files copied", stats.applied),
    ///     Err(abort) => eprintln!("Aborted: {}", abort),
    /// }
    /// ```
    pub fn apply(
        worklist: &[FileRecord],
        options: &PlacementOptions,
    ) -> Result<RunStatistics, PlacementAbort> {
        Self::apply_with(worklist, options, |_, _| {})
    }

    /// Like [`apply`](Self::apply), calling `on_outcome` after each record.
    pub fn apply_with<F>(
        worklist: &[FileRecord],
        options: &PlacementOptions,
        mut on_outcome: F,
    ) -> Result<RunStatistics, PlacementAbort>
    where
        F: FnMut(&FileRecord, Outcome),
    {
        let mut stats = RunStatistics {
            candidates: worklist.len(),
            ..RunStatistics::default()
        };

        for record in worklist {
            match Self::place(record, options) {
                Ok(outcome) => {
                    match outcome {
                        Outcome::Applied => stats.applied += 1,
                        Outcome::Skipped => stats.skipped += 1,
                    }
                    on_outcome(record, outcome);
                }
                Err(error) => return Err(PlacementAbort { stats, error }),
            }
        }

        Ok(stats)
    }

    /// Places a single record.
    ///
    /// Creates the `<year>/<month>` folder if needed, then copies or moves the
    /// file unless a same-named file is already there and overwriting is off.
    pub fn place(record: &FileRecord, options: &PlacementOptions) -> PlacementResult<Outcome> {
        let target_dir = record.target_dir(&options.destination_root);
        let target = record.target_path(&options.destination_root);

        if target.exists() {
            if is_same_file(&record.full_path, &target) {
                debug!("{} is already in place", target.display());
                return Ok(Outcome::Skipped);
            }
            if !options.overwrite_existing {
                debug!("Not overwriting existing file {}", target.display());
                return Ok(Outcome::Skipped);
            }
        }

        if options.dry_run {
            return Ok(Outcome::Applied);
        }

        fs::create_dir_all(&target_dir).map_err(|e| PlacementError::DestinationSetup {
            path: target_dir.clone(),
            source: e,
        })?;

        let result = match options.mode {
            TransferMode::Copy => fs::copy(&record.full_path, &target).map(|_| ()),
            TransferMode::Move => move_file(&record.full_path, &target),
        };

        result.map_err(|e| PlacementError::Transfer {
            source_path: record.full_path.clone(),
            destination: target.clone(),
            mode: options.mode,
            source_error: e,
        })?;

        debug!(
            "{} {} -> {}",
            options.mode.verb(),
            record.full_path.display(),
            target.display()
        );
        Ok(Outcome::Applied)
    }
}

/// True when both paths resolve to the same file on disk.
fn is_same_file(source: &Path, target: &Path) -> bool {
    match (fs::canonicalize(source), fs::canonicalize(target)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Renames `source` to `target`, falling back to copy and delete when they
/// are on different filesystems.
fn move_file(source: &Path, target: &Path) -> io::Result<()> {
    // rename does not replace an existing file on every platform
    if target.exists() {
        fs::remove_file(target)?;
    }

    match fs::rename(source, target) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            warn!(
                "{} is on another device, copying then removing",
                source.display()
            );
            fs::copy(source, target)?;
            fs::remove_file(source)
        }
        Err(e) => Err(e),
    }
}
