//! # Monitor Module
//!
//! Wires watcher, debouncer, scanner, resolver and deleter together.
//!
//! ## Flow
//! 1. **Watch** - notify events arrive on the watcher's delivery thread
//! 2. **Debounce** - bursts collapse into one batch per quiet period
//! 3. **Gate** - vanished or filtered-out paths are dropped
//! 4. **Rescan** - each affected parent directory is scanned for duplicates
//! 5. **Resolve** - every group is split into survivors and deletions
//! 6. **Delete** - the deleter removes the rest, with retries
//!
//! Scans run on a dedicated worker thread so a long pass never stalls the
//! watcher. A single atomic flag makes sure only one pass runs at a time,
//! whether it came from the watcher or from [`FolderMonitor::scan_now`].
//!
//! ## Example
//! ```rust,ignore
//! use folder_dedup::core::monitor::{FolderMonitor, MonitorConfig, ScanRequest};
//! use folder_dedup::events::EventChannel;
//!
//! let (sender, receiver) = EventChannel::new();
//! let config = MonitorConfig::new(ScanRequest::new("/Users/me/Downloads"));
//! let mut monitor = FolderMonitor::new(config, sender)?;
//! monitor.start()?;
//! for event in receiver.iter() {
//!     println!("{:?}", event);
//! }
//! ```

mod config;

pub use config::{MonitorConfig, ScanRequest};

use crate::core::debouncer::Debouncer;
use crate::core::deleter::SafeDeleter;
use crate::core::resolver::resolve_group;
use crate::core::scanner::{DuplicateGroup, DuplicateScanner, FileFilter};
use crate::core::versioning::VersionTracker;
use crate::core::watcher::{FolderWatcher, WatchSignal, WatcherConfig};
use crate::error::{DedupError, Result, WatcherError};
use crate::events::{
    Event, EventSender, GroupOutcome, ResolutionEvent, ResolutionReport, WatcherEvent,
};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Work items for the scan worker
enum Job {
    FullScan,
    Batch(Vec<PathBuf>),
    Modified(PathBuf),
}

/// Watches a folder and resolves duplicates as they appear
pub struct FolderMonitor {
    engine: Arc<Engine>,
    watcher: Option<FolderWatcher>,
    jobs: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl FolderMonitor {
    /// Validate `config` and prepare a monitor. Nothing runs until [`start`](Self::start).
    pub fn new(config: MonitorConfig, events: EventSender) -> Result<Self> {
        config.validate()?;

        let scanner = DuplicateScanner::new(config.scan_config())?;
        let deleter = SafeDeleter::new(config.deleter_config());
        let versions = config
            .versioning
            .as_ref()
            .map(|v| VersionTracker::new(v, scanner.hasher()));

        Ok(Self {
            engine: Arc::new(Engine {
                config,
                events,
                scanner,
                deleter,
                versions,
                processing: AtomicBool::new(false),
                stop_requested: AtomicBool::new(false),
            }),
            watcher: None,
            jobs: None,
            worker: None,
        })
    }

    /// Replace the deleter (e.g., with a zero-delay one for tests)
    pub fn with_deleter(mut self, deleter: SafeDeleter) -> Self {
        if let Some(engine) = Arc::get_mut(&mut self.engine) {
            engine.deleter = deleter;
        }
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.engine.config
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Whether a resolution pass is in flight
    pub fn is_processing(&self) -> bool {
        self.engine.processing.load(Ordering::SeqCst)
    }

    /// Start watching and queue an initial full pass
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            self.engine.events.warning("Monitoring is already running");
            return Err(WatcherError::AlreadyRunning.into());
        }

        let folder = self.engine.config.request.folder.clone();
        let events = self.engine.events.clone();
        self.engine.stop_requested.store(false, Ordering::SeqCst);

        match self.engine.scanner.available_extensions(&folder) {
            Ok(extensions) => {
                events.info(format!("Found {} file extensions in folder", extensions.len()))
            }
            Err(e) => events.error(format!("Error scanning for extensions: {}", e)),
        }

        if let Some(versions) = &self.engine.versions {
            let seeded = versions.seed(&folder);
            events.debug(format!("Tracking {} versioned files", seeded));
            match versions.store().prune(chrono::Local::now()) {
                Ok(0) => {}
                Ok(pruned) => events.info(format!("Pruned {} expired backups", pruned)),
                Err(e) => events.warning(format!("Backup pruning failed: {}", e)),
            }
        }

        let (jobs, queue) = unbounded();
        let worker = spawn_worker(Arc::clone(&self.engine), queue)?;
        self.worker = Some(worker);

        let watcher = match self.build_watcher(&jobs) {
            Ok(watcher) => watcher,
            Err(e) => {
                drop(jobs);
                self.join_worker();
                return Err(e);
            }
        };
        self.watcher = Some(watcher);

        let _ = jobs.send(Job::FullScan);
        self.jobs = Some(jobs);

        events.send(Event::Watcher(WatcherEvent::Started {
            path: folder.clone(),
        }));
        events.success(format!("Started monitoring: {}", folder.display()));
        Ok(())
    }

    /// Stop watching and wait for the worker.
    ///
    /// A pass in flight finishes its current directory, then exits.
    pub fn stop(&mut self) {
        if !self.is_running() {
            return;
        }

        self.engine.stop_requested.store(true, Ordering::SeqCst);
        if let Some(mut watcher) = self.watcher.take() {
            watcher.stop();
        }
        if self.engine.processing.swap(false, Ordering::SeqCst) {
            self.engine.events.info("Scan stopped by user");
        }

        self.jobs = None;
        self.join_worker();
        self.engine.stop_requested.store(false, Ordering::SeqCst);

        let folder = self.engine.config.request.folder.clone();
        self.engine
            .events
            .send(Event::Watcher(WatcherEvent::Stopped { path: folder }));
        self.engine.events.info("Monitoring stopped");
    }

    /// Run a full pass on the calling thread.
    ///
    /// Fails with [`DedupError::Busy`] while another pass is running.
    pub fn scan_now(&self) -> Result<ResolutionReport> {
        self.engine.full_pass().ok_or(DedupError::Busy)
    }

    /// Process a batch of changed paths on the calling thread
    pub fn process_batch(&self, paths: Vec<PathBuf>) -> Result<ResolutionReport> {
        self.engine.batch_pass(paths).ok_or(DedupError::Busy)
    }

    fn build_watcher(&self, jobs: &Sender<Job>) -> Result<FolderWatcher> {
        let batches = jobs.clone();
        let batch_events = self.engine.events.clone();
        let mut debouncer = Debouncer::new(self.engine.config.debounce(), move |paths| {
            batch_events.send(Event::Watcher(WatcherEvent::BatchReady {
                paths: paths.clone(),
            }));
            let _ = batches.send(Job::Batch(paths));
        });
        if let Some(versioning) = &self.engine.config.versioning {
            let modified = jobs.clone();
            debouncer = debouncer.with_modified_route(&versioning.extensions, move |path| {
                let _ = modified.send(Job::Modified(path));
            });
        }

        let events = self.engine.events.clone();
        let mut watcher = FolderWatcher::new(WatcherConfig::default(), move |signal| {
            match signal {
                WatchSignal::Change(event) => debouncer.push(event),
                WatchSignal::Error(message) => {
                    events.error(format!("Watcher error: {}", message));
                    events.send(Event::Watcher(WatcherEvent::Error { message }));
                }
            }
        })?;
        watcher.watch(&self.engine.config.request.folder)?;
        Ok(watcher)
    }

    fn join_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Scan worker panicked");
            }
        }
    }
}

impl Drop for FolderMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_worker(engine: Arc<Engine>, queue: Receiver<Job>) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("dedup-worker".to_string())
        .spawn(move || {
            for job in queue.iter() {
                if engine.stop_requested.load(Ordering::SeqCst) {
                    continue;
                }
                engine.run(job);
            }
        })
        .map_err(|e| WatcherError::InitFailed(e.to_string()).into())
}

/// Clears the processing flag when a pass ends
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// State shared between the monitor handle and its worker
struct Engine {
    config: MonitorConfig,
    events: EventSender,
    scanner: DuplicateScanner,
    deleter: SafeDeleter,
    versions: Option<VersionTracker>,
    processing: AtomicBool,
    stop_requested: AtomicBool,
}

impl Engine {
    fn run(&self, job: Job) {
        match job {
            Job::FullScan => {
                self.events.info("Performing initial duplicate scan...");
                match self.full_pass() {
                    Some(report) if report.groups_processed == 0 => {
                        self.events.info("No duplicates found in initial scan")
                    }
                    Some(report) => self.events.info(format!(
                        "Found {} duplicate groups in initial scan",
                        report.groups_processed
                    )),
                    None => self
                        .events
                        .warning("Initial scan skipped: a scan is already running"),
                }
            }
            Job::Batch(paths) => {
                let count = paths.len();
                if self.batch_pass(paths).is_none() {
                    self.events.warning(format!(
                        "Skipped changes in {} files: a scan is already running",
                        count
                    ));
                }
            }
            Job::Modified(path) => self.version(&path),
        }
    }

    fn begin(&self) -> Option<ProcessingGuard<'_>> {
        self.processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| ProcessingGuard(&self.processing))
    }

    fn full_pass(&self) -> Option<ResolutionReport> {
        let _guard = self.begin()?;
        let mut directories = BTreeSet::new();
        directories.insert(self.config.request.folder.clone());
        Some(self.process_directories(directories))
    }

    fn batch_pass(&self, paths: Vec<PathBuf>) -> Option<ResolutionReport> {
        let _guard = self.begin()?;
        self.events
            .info(format!("Detected changes in {} files", paths.len()));

        let filters = &self.config.request.filters;
        let filter = FileFilter::new(filters.clone());
        let mut directories = BTreeSet::new();

        for path in paths {
            if !path.exists() {
                continue;
            }
            if filters.enabled && !filter.passes(&path) {
                self.events.debug(format!(
                    "Ignored {} (didn't pass filters)",
                    display_name(&path)
                ));
                continue;
            }
            if let Some(parent) = path.parent() {
                directories.insert(parent.to_path_buf());
            }
        }

        Some(self.process_directories(directories))
    }

    fn process_directories(&self, directories: BTreeSet<PathBuf>) -> ResolutionReport {
        let mut report = ResolutionReport::default();

        for directory in directories {
            if self.stop_requested.load(Ordering::SeqCst) {
                break;
            }

            let groups = match self.scanner.find_duplicates_with_events(
                &directory,
                &self.config.request.filters,
                &self.events,
            ) {
                Ok(groups) => groups,
                Err(e) => {
                    self.events.error(format!(
                        "Error processing {}: {}",
                        directory.display(),
                        e
                    ));
                    continue;
                }
            };

            if groups.is_empty() {
                self.events
                    .debug(format!("No duplicates found in {}", directory.display()));
                continue;
            }
            self.events.info(format!(
                "Found {} duplicate groups in {}",
                groups.len(),
                directory.display()
            ));

            // Stop is only honored between directories
            for group in &groups {
                let outcome = self.resolve(group);
                report.record(&outcome);
                self.events
                    .send(Event::Resolution(ResolutionEvent::GroupResolved(outcome)));
            }
        }

        self.events.info(format!(
            "Duplicate resolution complete. Processed {} groups, deleted {} files",
            report.groups_processed, report.files_deleted
        ));
        self.events
            .send(Event::Resolution(ResolutionEvent::Completed(report.clone())));
        report
    }

    fn resolve(&self, group: &DuplicateGroup) -> GroupOutcome {
        self.events.info(format!(
            "Processing {} duplicates for hash {}...",
            group.len(),
            group.fingerprint.short()
        ));

        let resolution = resolve_group(&group.paths, &self.config.request.policy);
        let mut outcome = GroupOutcome {
            fingerprint: group.fingerprint.to_hex(),
            ..GroupOutcome::default()
        };

        if let Some(missing) = resolution.keep.iter().find(|p| !is_present(p)) {
            self.events.warning(format!(
                "Skipping group {}: survivor {} no longer exists",
                group.fingerprint.short(),
                display_name(missing)
            ));
            return outcome;
        }

        for kept in &resolution.keep {
            self.events
                .success(format!("Keeping: {}", display_name(kept)));
        }

        outcome.kept = resolution.keep;

        for path in resolution.delete {
            if !is_present(&path) {
                self.events
                    .debug(format!("Skipped {} (already gone)", display_name(&path)));
                continue;
            }
            if self.deleter.is_cloud_path(&path) {
                self.events.warning(format!(
                    "Attempting to delete cloud-synced file: {}",
                    display_name(&path)
                ));
            }

            if self.config.dry_run {
                self.events
                    .info(format!("Would delete: {}", display_name(&path)));
                outcome.deleted.push(path);
            } else if self.deleter.safe_delete_with_events(
                &path,
                self.config.delete_method,
                &self.events,
            ) {
                self.events.info(format!("Deleted: {}", display_name(&path)));
                if let Some(versions) = &self.versions {
                    versions.forget(&path);
                }
                outcome.deleted.push(path);
            } else {
                self.events.error(format!(
                    "Failed to delete: {} (file may be locked)",
                    display_name(&path)
                ));
                outcome.failed.push(path);
            }
        }

        outcome
    }

    fn version(&self, path: &Path) {
        let Some(versions) = &self.versions else {
            return;
        };
        match versions.on_modified(path) {
            Ok(Some(backup)) => self.events.info(format!(
                "Saved version of {} as {}",
                display_name(path),
                display_name(&backup)
            )),
            Ok(None) => self
                .events
                .debug(format!("No content change in {}", display_name(path))),
            Err(e) => self.events.error(format!(
                "Could not back up {}: {}",
                display_name(path),
                e
            )),
        }
    }
}

/// Present on disk, counting dangling symlinks
fn is_present(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
