//! Single-directory scanning and entry classification.
//!
//! A [`DirectoryScanner`] lists one directory, classifies every child and
//! turns regular files into [`FileRecord`]s. Subdirectories are reported back
//! to the caller instead of being descended into, so the traversal layer
//! decides how and when they are scanned.

use crate::config::FileFilters;
use crate::filename_date::{DateBucket, DateExtractor};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, DirEntry};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, warn};

/// Where a record's year and month came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    /// A date stamp embedded in the file name.
    Filename,
    /// The file's modification time.
    Modified,
}

/// A regular file discovered during traversal, with its destination bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Path of the source file.
    pub full_path: PathBuf,
    /// Base name of the source file.
    pub name: String,
    /// Year bucket.
    pub year: i32,
    /// Full month name bucket, e.g. `"November"`.
    pub month: String,
    /// Which date won for this record.
    pub date_source: DateSource,
}

impl FileRecord {
    pub fn new(full_path: PathBuf, bucket: DateBucket, date_source: DateSource) -> Self {
        let name = full_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            full_path,
            name,
            year: bucket.year,
            month: bucket.month_name().to_string(),
            date_source,
        }
    }

    /// The `<root>/<year>/<month>` folder this record belongs in.
    pub fn target_dir(&self, destination_root: &Path) -> PathBuf {
        destination_root
            .join(self.year.to_string())
            .join(&self.month)
    }

    /// The full target path of this record under `destination_root`.
    ///
    /// Uses the raw file name so non-UTF-8 names survive unchanged.
    pub fn target_path(&self, destination_root: &Path) -> PathBuf {
        let dir = self.target_dir(destination_root);
        match self.full_path.file_name() {
            Some(name) => dir.join(name),
            None => dir.join(&self.name),
        }
    }
}

/// What to do when a directory cannot be listed or an entry cannot be stat'ed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Stop the whole run on the first failure.
    #[default]
    Abort,
    /// Log a warning, drop the offending directory or entry and keep going.
    Skip,
}

/// Errors raised while scanning the source tree.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Error reading directory {}: {source}", path.display())]
    ReadDir { path: PathBuf, source: io::Error },

    #[error("Error reading metadata for {}: {source}", path.display())]
    Stat { path: PathBuf, source: io::Error },

    #[error("Could not start scan workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// The result of scanning a single directory.
#[derive(Debug, Default)]
pub struct DirectoryListing {
    /// Records for the regular files directly inside the directory.
    pub files: Vec<FileRecord>,
    /// Child directories still to be scanned.
    pub subdirectories: Vec<PathBuf>,
}

enum Entry {
    File(FileRecord),
    Directory(PathBuf),
    Ignored,
}

/// Lists and classifies the children of one directory at a time.
#[derive(Debug)]
pub struct DirectoryScanner {
    destination: PathBuf,
    extractor: DateExtractor,
    filters: FileFilters,
    error_policy: ErrorPolicy,
}

impl DirectoryScanner {
    /// Creates a scanner that skips `destination` wherever it appears.
    ///
    /// `destination` should already be normalized with [`normalize_path`].
    pub fn new(destination: PathBuf) -> Self {
        Self {
            destination,
            extractor: DateExtractor::default(),
            filters: FileFilters::default(),
            error_policy: ErrorPolicy::default(),
        }
    }

    pub fn with_extractor(mut self, extractor: DateExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_filters(mut self, filters: FileFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_error_policy(mut self, error_policy: ErrorPolicy) -> Self {
        self.error_policy = error_policy;
        self
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn is_destination(&self, path: &Path) -> bool {
        path == self.destination
    }

    /// Scans the direct children of `dir`.
    ///
    /// Sibling entries are classified in parallel on the current rayon pool.
    /// The destination directory is never reported as a subdirectory.
    ///
    /// # Errors
    ///
    /// Under [`ErrorPolicy::Abort`], returns a [`ScanError`] if the directory
    /// cannot be listed or any child cannot be stat'ed. Under
    /// [`ErrorPolicy::Skip`] those failures are logged and never returned.
    pub fn scan(&self, dir: &Path) -> Result<DirectoryListing, ScanError> {
        debug!("Reading directory: {}", dir.display());

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(source) => {
                self.tolerate(ScanError::ReadDir {
                    path: dir.to_path_buf(),
                    source,
                })?;
                return Ok(DirectoryListing::default());
            }
        };

        let mut children = Vec::new();
        for entry in entries {
            match entry {
                Ok(entry) => children.push(entry),
                Err(source) => self.tolerate(ScanError::ReadDir {
                    path: dir.to_path_buf(),
                    source,
                })?,
            }
        }

        let classified = children
            .into_par_iter()
            .map(|entry| self.classify(entry))
            .collect::<Result<Vec<_>, _>>()?;

        let mut listing = DirectoryListing::default();
        for entry in classified {
            match entry {
                Entry::File(record) => listing.files.push(record),
                Entry::Directory(path) => listing.subdirectories.push(path),
                Entry::Ignored => {}
            }
        }

        debug!(
            "Directory {} yielded {} records and {} subdirectories",
            dir.display(),
            listing.files.len(),
            listing.subdirectories.len()
        );
        Ok(listing)
    }

    /// Builds the record for a regular file, preferring a date from its name.
    pub fn build_record(&self, path: PathBuf, modified: SystemTime) -> FileRecord {
        let from_name = path
            .file_name()
            .and_then(|name| self.extractor.extract(&name.to_string_lossy()));

        match from_name {
            Some(bucket) => FileRecord::new(path, bucket, DateSource::Filename),
            None => FileRecord::new(
                path,
                DateBucket::from_system_time(modified),
                DateSource::Modified,
            ),
        }
    }

    fn classify(&self, entry: DirEntry) -> Result<Entry, ScanError> {
        let path = entry.path();

        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(source) => return self.skip_entry(ScanError::Stat { path, source }),
        };

        if file_type.is_dir() {
            if self.is_destination(&path) {
                debug!("Found destination path in source path, ignoring");
                return Ok(Entry::Ignored);
            }
            return Ok(Entry::Directory(path));
        }

        let metadata = if file_type.is_symlink() {
            match fs::metadata(&path) {
                Ok(metadata) if metadata.is_dir() => {
                    debug!("Not following directory symlink {}", path.display());
                    return Ok(Entry::Ignored);
                }
                Ok(metadata) => metadata,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!("Dropping dangling symlink {}", path.display());
                    return Ok(Entry::Ignored);
                }
                Err(source) => return self.skip_entry(ScanError::Stat { path, source }),
            }
        } else {
            match entry.metadata() {
                Ok(metadata) => metadata,
                Err(source) => return self.skip_entry(ScanError::Stat { path, source }),
            }
        };

        if !metadata.is_file() {
            return Ok(Entry::Ignored);
        }

        if !self.filters.should_include(&path) {
            debug!("Excluded by filters: {}", path.display());
            return Ok(Entry::Ignored);
        }

        let modified = match metadata.modified() {
            Ok(modified) => modified,
            Err(source) => return self.skip_entry(ScanError::Stat { path, source }),
        };

        Ok(Entry::File(self.build_record(path, modified)))
    }

    fn skip_entry(&self, err: ScanError) -> Result<Entry, ScanError> {
        self.tolerate(err).map(|()| Entry::Ignored)
    }

    fn tolerate(&self, err: ScanError) -> Result<(), ScanError> {
        match self.error_policy {
            ErrorPolicy::Abort => Err(err),
            ErrorPolicy::Skip => {
                warn!("Skipping: {}", err);
                Ok(())
            }
        }
    }
}

/// Makes `path` absolute and resolves symlinks in the part of it that exists.
///
/// The destination may not exist yet, so the longest existing ancestor is
/// canonicalized and the remaining components are appended unchanged.
pub fn normalize_path(path: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut existing = absolute.as_path();
    let mut missing = Vec::new();

    loop {
        if let Ok(mut resolved) = existing.canonicalize() {
            for component in missing.iter().rev() {
                resolved.push(component);
            }
            return Ok(resolved);
        }

        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(absolute),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use std::fs::File;
    use tempfile::TempDir;

    fn set_mtime(path: &Path, year: i32, month: u32, day: u32) {
        let time = Local.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap();
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::from(time))
            .unwrap();
    }

    fn scanner_for(temp_dir: &TempDir) -> DirectoryScanner {
        let destination = normalize_path(&temp_dir.path().join("dst")).unwrap();
        DirectoryScanner::new(destination)
    }

    #[test]
    fn test_scan_classifies_files_and_directories() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = normalize_path(temp_dir.path()).unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join("b.txt"), "b").unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub").join("c.txt"), "c").unwrap();

        let listing = scanner_for(&temp_dir).scan(&root).unwrap();

        let mut names: Vec<_> = listing.files.iter().map(|r| r.name.clone()).collect();
        names.sort();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
        assert_eq!(listing.subdirectories, vec![root.join("sub")]);
    }

    #[test]
    fn test_scan_skips_destination_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = normalize_path(temp_dir.path()).unwrap();
        fs::create_dir(root.join("dst")).unwrap();
        fs::create_dir(root.join("other")).unwrap();

        let listing = scanner_for(&temp_dir).scan(&root).unwrap();

        assert_eq!(listing.subdirectories, vec![root.join("other")]);
    }

    #[test]
    fn test_record_uses_modification_time() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = normalize_path(temp_dir.path()).unwrap();
        let file = root.join("c.txt");
        fs::write(&file, "c").unwrap();
        set_mtime(&file, 2011, 11, 3);

        let listing = scanner_for(&temp_dir).scan(&root).unwrap();

        let record = &listing.files[0];
        assert_eq!(record.year, 2011);
        assert_eq!(record.month, "November");
        assert_eq!(record.date_source, DateSource::Modified);
        assert_eq!(record.full_path, file);
    }

    #[test]
    fn test_filename_date_overrides_modification_time() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = normalize_path(temp_dir.path()).unwrap();
        let file = root.join("photo_20150612_party.jpg");
        fs::write(&file, "jpg").unwrap();
        set_mtime(&file, 2020, 1, 1);

        let listing = scanner_for(&temp_dir).scan(&root).unwrap();

        let record = &listing.files[0];
        assert_eq!(record.year, 2015);
        assert_eq!(record.month, "June");
        assert_eq!(record.date_source, DateSource::Filename);
    }

    #[test]
    fn test_disabled_extractor_keeps_modification_time() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = normalize_path(temp_dir.path()).unwrap();
        let file = root.join("photo_20150612_party.jpg");
        fs::write(&file, "jpg").unwrap();
        set_mtime(&file, 2020, 1, 1);

        let listing = scanner_for(&temp_dir)
            .with_extractor(DateExtractor::disabled())
            .scan(&root)
            .unwrap();

        assert_eq!(listing.files[0].year, 2020);
        assert_eq!(listing.files[0].month, "January");
    }

    #[test]
    fn test_missing_directory_aborts_by_default() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let missing = temp_dir.path().join("gone");

        let result = scanner_for(&temp_dir).scan(&missing);

        assert!(matches!(result, Err(ScanError::ReadDir { .. })));
    }

    #[test]
    fn test_missing_directory_skipped_with_skip_policy() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let missing = temp_dir.path().join("gone");

        let listing = scanner_for(&temp_dir)
            .with_error_policy(ErrorPolicy::Skip)
            .scan(&missing)
            .unwrap();

        assert!(listing.files.is_empty());
        assert!(listing.subdirectories.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks() {
        use std::os::unix::fs::symlink;

        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = normalize_path(temp_dir.path()).unwrap();
        fs::write(root.join("real.txt"), "x").unwrap();
        fs::create_dir(root.join("dir")).unwrap();
        symlink(root.join("real.txt"), root.join("link.txt")).unwrap();
        symlink(root.join("nowhere"), root.join("dangling")).unwrap();
        symlink(root.join("dir"), root.join("dirlink")).unwrap();

        let listing = scanner_for(&temp_dir).scan(&root).unwrap();

        let mut names: Vec<_> = listing.files.iter().map(|r| r.name.clone()).collect();
        names.sort();
        assert_eq!(names, vec!["link.txt", "real.txt"]);
        assert_eq!(listing.subdirectories, vec![root.join("dir")]);
    }

    #[test]
    fn test_target_path() {
        let record = FileRecord::new(
            PathBuf::from("/src/a/b/c.txt"),
            DateBucket { year: 2011, month: 11 },
            DateSource::Modified,
        );

        assert_eq!(record.name, "c.txt");
        assert_eq!(
            record.target_path(Path::new("/dst")),
            PathBuf::from("/dst/2011/November/c.txt")
        );
    }

    #[test]
    fn test_normalize_path_handles_missing_tail() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path().canonicalize().unwrap();

        let normalized = normalize_path(&temp_dir.path().join("not").join("yet")).unwrap();
        assert_eq!(normalized, base.join("not").join("yet"));

        let dotted = normalize_path(&temp_dir.path().join(".").join("x")).unwrap();
        assert_eq!(dotted, base.join("x"));
    }
}
