//! datesort - sort a directory tree into year/month folders
//!
//! This library walks a source directory concurrently, works out a
//! `<year>/<month>` bucket for every regular file (from a date stamp in the
//! file name, or else its modification time) and copies or moves each file
//! into that layout under a destination directory.

pub mod cli;
pub mod config;
pub mod filename_date;
pub mod logging;
pub mod output;
pub mod placement;
pub mod scanner;
pub mod traversal;

pub use config::{ConfigError, FileFilters, SortConfig};
pub use filename_date::{DateBucket, DateExtractor, DateMatcher};
pub use placement::{PlacementApplier, PlacementOptions, RunStatistics, TransferMode};
pub use scanner::{DirectoryScanner, ErrorPolicy, FileRecord, ScanError};
pub use traversal::{TraversalCoordinator, TraversalReport};

pub use cli::{Cli, RunError, run};
