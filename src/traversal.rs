//! Concurrent traversal of the source tree.
//!
//! The [`TraversalCoordinator`] drives a [`DirectoryScanner`] over every
//! directory below the root on a bounded rayon pool. Each directory is one
//! task in a single `rayon::scope`; a scan spawns tasks for the
//! subdirectories it finds, and the scope only returns once every task,
//! however deeply nested, has finished. All records end up in one worklist.

use crate::scanner::{DirectoryScanner, FileRecord, ScanError, normalize_path};
use dashmap::DashSet;
use rayon::{Scope, ThreadPoolBuilder};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Receives progress notifications while the tree is being scanned.
///
/// Methods may be called from any scan worker.
pub trait TraversalObserver: Send + Sync {
    /// A directory finished scanning and contributed `files` records.
    fn directory_scanned(&self, _dir: &Path, _files: usize) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TraversalObserver for NoopObserver {}

/// Bookkeeping of directory scans that have been scheduled but not finished.
#[derive(Debug, Default)]
pub struct TraversalState {
    pending: DashSet<PathBuf>,
    scheduled: AtomicUsize,
    completed: AtomicUsize,
}

impl TraversalState {
    fn register(&self, dir: &Path) {
        self.pending.insert(dir.to_path_buf());
        self.scheduled.fetch_add(1, Ordering::SeqCst);
    }

    fn complete(&self, dir: &Path) {
        self.pending.remove(dir);
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    /// Number of directories currently scheduled or being scanned.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Number of directory scans scheduled so far.
    pub fn scheduled(&self) -> usize {
        self.scheduled.load(Ordering::SeqCst)
    }

    /// Number of directory scans that have finished.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// True once at least one scan was scheduled and none remain.
    pub fn is_complete(&self) -> bool {
        self.scheduled() > 0 && self.pending.is_empty()
    }
}

/// Everything a finished traversal produced.
#[derive(Debug, Default)]
pub struct TraversalReport {
    /// All records, in scan completion order.
    pub worklist: Vec<FileRecord>,
    /// Number of directories scanned, the root included.
    pub directories_scanned: usize,
    /// The root was the destination itself and was left unscanned.
    pub skipped_as_destination: bool,
}

/// Walks a source tree and gathers every regular file into one worklist.
#[derive(Debug)]
pub struct TraversalCoordinator {
    scanner: DirectoryScanner,
    workers: usize,
}

impl TraversalCoordinator {
    pub fn new(scanner: DirectoryScanner) -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self { scanner, workers }
    }

    /// Caps the number of directories scanned at the same time.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn scanner(&self) -> &DirectoryScanner {
        &self.scanner
    }

    /// Scans `root` and everything below it.
    ///
    /// # Errors
    ///
    /// Returns the first [`ScanError`] raised by any directory scan. Scans
    /// already running when it happens are allowed to finish; queued scans
    /// are dropped.
    pub fn run(&self, root: &Path) -> Result<TraversalReport, ScanError> {
        self.run_with_observer(root, &NoopObserver)
    }

    /// Like [`run`](Self::run), reporting progress to `observer`.
    pub fn run_with_observer(
        &self,
        root: &Path,
        observer: &dyn TraversalObserver,
    ) -> Result<TraversalReport, ScanError> {
        let root = normalize_path(root).map_err(|source| ScanError::ReadDir {
            path: root.to_path_buf(),
            source,
        })?;

        if self.scanner.is_destination(&root) {
            warn!("Source directory is same as destination directory, ignoring");
            return Ok(TraversalReport {
                skipped_as_destination: true,
                ..TraversalReport::default()
            });
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("datesort-scan-{i}"))
            .build()?;

        info!("Scanning {} with {} workers", root.display(), self.workers);

        let run = TraversalRun {
            scanner: &self.scanner,
            observer,
            state: TraversalState::default(),
            worklist: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            aborted: AtomicBool::new(false),
        };

        pool.scope(|scope| {
            run.state.register(&root);
            run.visit(scope, root);
        });

        debug_assert!(run.state.is_complete());

        let TraversalRun {
            state,
            worklist,
            failure,
            ..
        } = run;

        if let Some(err) = failure.into_inner().unwrap_or_else(PoisonError::into_inner) {
            return Err(err);
        }

        let worklist = worklist.into_inner().unwrap_or_else(PoisonError::into_inner);
        info!(
            "Traversal complete: {} records from {} directories",
            worklist.len(),
            state.completed()
        );

        Ok(TraversalReport {
            worklist,
            directories_scanned: state.completed(),
            skipped_as_destination: false,
        })
    }
}

/// State shared by every scan task of one traversal.
struct TraversalRun<'a> {
    scanner: &'a DirectoryScanner,
    observer: &'a dyn TraversalObserver,
    state: TraversalState,
    worklist: Mutex<Vec<FileRecord>>,
    failure: Mutex<Option<ScanError>>,
    aborted: AtomicBool,
}

impl TraversalRun<'_> {
    fn visit<'scope>(&'scope self, scope: &Scope<'scope>, dir: PathBuf) {
        if self.aborted.load(Ordering::Acquire) {
            self.state.complete(&dir);
            return;
        }

        match self.scanner.scan(&dir) {
            Ok(listing) => {
                // Children go into `pending` before this directory leaves it.
                for subdirectory in listing.subdirectories {
                    self.state.register(&subdirectory);
                    scope.spawn(move |scope| self.visit(scope, subdirectory));
                }

                let files = listing.files.len();
                self.worklist
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend(listing.files);
                self.observer.directory_scanned(&dir, files);
                debug!(
                    "Directory {} processed, {} pending",
                    dir.display(),
                    self.state.pending()
                );
            }
            Err(err) => self.abort(err),
        }

        self.state.complete(&dir);
    }

    fn abort(&self, err: ScanError) {
        self.aborted.store(true, Ordering::Release);
        let mut failure = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        if failure.is_none() {
            *failure = Some(err);
        } else {
            debug!("Additional scan failure after abort: {}", err);
        }
    }
}
