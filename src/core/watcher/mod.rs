//! # Folder Watcher Module
//!
//! Subscribes to filesystem notifications for a folder tree.
//!
//! ## Features
//! - Recursive watching via `notify`'s recommended backend
//! - Translates notify events into [`RawEvent`]s for the debouncer
//! - Delivers on a dedicated thread that [`FolderWatcher::stop`] joins
//!
//! ## Example
//! ```rust,ignore
//! use folder_dedup::core::watcher::{FolderWatcher, WatchSignal, WatcherConfig};
//!
//! let mut watcher = FolderWatcher::new(WatcherConfig::default(), |signal| {
//!     if let WatchSignal::Change(event) = signal {
//!         println!("{:?} {}", event.kind, event.path.display());
//!     }
//! })?;
//! watcher.watch("/Users/me/Documents")?;
//! // ...
//! watcher.stop();
//! ```

use crate::core::debouncer::{ChangeKind, RawEvent};
use crate::error::WatcherError;
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

/// Configuration for the folder watcher
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Whether to watch subdirectories recursively
    pub recursive: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self { recursive: true }
    }
}

/// What the watcher hands to its handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchSignal {
    /// A file or directory changed
    Change(RawEvent),
    /// The backend reported an error
    Error(String),
}

/// Watches folders and forwards changes to a handler thread
pub struct FolderWatcher {
    watcher: Option<RecommendedWatcher>,
    config: WatcherConfig,
    watched_paths: BTreeSet<PathBuf>,
    shutdown: Option<Sender<()>>,
    delivery: Option<JoinHandle<()>>,
}

impl FolderWatcher {
    /// Create a watcher whose notifications are passed to `handler`
    pub fn new<F>(config: WatcherConfig, handler: F) -> Result<Self, WatcherError>
    where
        F: Fn(WatchSignal) + Send + 'static,
    {
        let (event_tx, event_rx) = unbounded::<notify::Result<Event>>();
        let watcher = notify::recommended_watcher(move |result| {
            let _ = event_tx.send(result);
        })
        .map_err(|e| WatcherError::InitFailed(e.to_string()))?;

        let (shutdown_tx, shutdown_rx) = bounded(1);
        let delivery = thread::Builder::new()
            .name("watch-delivery".to_string())
            .spawn(move || deliver(event_rx, shutdown_rx, handler))
            .map_err(|e| WatcherError::InitFailed(e.to_string()))?;

        Ok(Self {
            watcher: Some(watcher),
            config,
            watched_paths: BTreeSet::new(),
            shutdown: Some(shutdown_tx),
            delivery: Some(delivery),
        })
    }

    /// Start watching a directory
    pub fn watch(&mut self, path: impl AsRef<Path>) -> Result<(), WatcherError> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            return Err(WatcherError::PathNotFound(path));
        }

        let mode = if self.config.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };

        let watcher = self.watcher.as_mut().ok_or_else(|| WatcherError::WatchFailed {
            path: path.clone(),
            reason: "watcher has been stopped".to_string(),
        })?;

        watcher
            .watch(&path, mode)
            .map_err(|e| WatcherError::WatchFailed {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        self.watched_paths.insert(path);
        Ok(())
    }

    /// Get list of currently watched paths
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.watched_paths.iter().cloned().collect()
    }

    /// Check if a path is being watched
    pub fn is_watching(&self, path: impl AsRef<Path>) -> bool {
        self.watched_paths.contains(path.as_ref())
    }

    pub fn is_running(&self) -> bool {
        self.delivery.is_some()
    }

    /// Tear down the subscription and join the delivery thread.
    ///
    /// Once this returns the handler is never called again.
    pub fn stop(&mut self) {
        // Dropping the backend disconnects the event channel.
        self.watcher = None;
        self.watched_paths.clear();

        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(delivery) = self.delivery.take() {
            if delivery.join().is_err() {
                tracing::error!("Watch delivery thread panicked");
            }
        }
    }
}

impl Drop for FolderWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn deliver<F>(events: Receiver<notify::Result<Event>>, shutdown: Receiver<()>, handler: F)
where
    F: Fn(WatchSignal),
{
    loop {
        select! {
            recv(shutdown) -> _ => break,
            recv(events) -> message => match message {
                Ok(Ok(event)) => {
                    for raw in translate(event) {
                        handler(WatchSignal::Change(raw));
                    }
                }
                Ok(Err(e)) => handler(WatchSignal::Error(e.to_string())),
                Err(_) => break,
            },
        }
    }
}

/// Convert a notify event into zero or more raw events
fn translate(event: Event) -> Vec<RawEvent> {
    let raw = |path: &PathBuf, kind: ChangeKind, is_dir: bool| RawEvent {
        path: path.clone(),
        kind,
        is_dir,
    };

    match event.kind {
        EventKind::Create(kind) => event
            .paths
            .iter()
            .map(|p| raw(p, ChangeKind::Created, kind == CreateKind::Folder || p.is_dir()))
            .collect(),
        EventKind::Remove(kind) => event
            .paths
            .iter()
            .map(|p| raw(p, ChangeKind::Removed, kind == RemoveKind::Folder))
            .collect(),
        EventKind::Modify(ModifyKind::Name(mode)) => match (mode, event.paths.as_slice()) {
            (RenameMode::Both, [from, to]) => vec![
                raw(from, ChangeKind::Removed, false),
                raw(to, ChangeKind::Created, to.is_dir()),
            ],
            (RenameMode::From, paths) => paths
                .iter()
                .map(|p| raw(p, ChangeKind::Removed, false))
                .collect(),
            (_, paths) => paths
                .iter()
                .map(|p| {
                    let kind = if p.exists() {
                        ChangeKind::Created
                    } else {
                        ChangeKind::Removed
                    };
                    raw(p, kind, p.is_dir())
                })
                .collect(),
        },
        EventKind::Modify(_) => event
            .paths
            .iter()
            .map(|p| raw(p, ChangeKind::Modified, p.is_dir()))
            .collect(),
        _ => Vec::new(),
    }
}
