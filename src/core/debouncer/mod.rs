//! # Debouncer Module
//!
//! Collapses bursts of filesystem events into one batch per quiet period.
//!
//! ## States
//! - **Idle** - no timer armed, pending set empty
//! - **Accumulating** - timer armed, paths being collected
//!
//! Every event for a non-directory path cancels the timer, joins the pending
//! set and re-arms the timer. When the quiet period passes untouched, the
//! pending set is drained under its lock and handed to the batch callback.
//!
//! ## Modification Routing
//! With [`Debouncer::with_modified_route`], `Modified` events for a chosen set
//! of extensions bypass the batch and go straight to a separate callback
//! (used for version backups). Everything else still triggers a re-scan.

mod timer;

pub use timer::DelayedTask;

use crate::core::scanner::{extension_of, normalize_extension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Default quiet period before a batch is delivered
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_secs(1);

/// What happened to a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

/// A single filesystem notification, before debouncing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub is_dir: bool,
}

impl RawEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            is_dir: false,
        }
    }

    pub fn directory(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            is_dir: true,
        }
    }
}

type BatchCallback = Arc<dyn Fn(Vec<PathBuf>) + Send + Sync>;
type ModifiedCallback = Arc<dyn Fn(PathBuf) + Send + Sync>;

struct ModifiedRoute {
    extensions: BTreeSet<String>,
    callback: ModifiedCallback,
}

/// Batches raw events and delivers them after a quiet period
pub struct Debouncer {
    quiet_period: Duration,
    pending: Arc<Mutex<BTreeSet<PathBuf>>>,
    timer: DelayedTask,
    on_batch: BatchCallback,
    modified_route: Option<ModifiedRoute>,
}

impl Debouncer {
    /// Create a debouncer that calls `on_batch` with each drained batch
    pub fn new<F>(quiet_period: Duration, on_batch: F) -> Self
    where
        F: Fn(Vec<PathBuf>) + Send + Sync + 'static,
    {
        Self {
            quiet_period,
            pending: Arc::new(Mutex::new(BTreeSet::new())),
            timer: DelayedTask::new(),
            on_batch: Arc::new(on_batch),
            modified_route: None,
        }
    }

    /// Send `Modified` events for `extensions` to `callback` instead of batching them
    pub fn with_modified_route<I, S, F>(mut self, extensions: I, callback: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn(PathBuf) + Send + Sync + 'static,
    {
        self.modified_route = Some(ModifiedRoute {
            extensions: extensions
                .into_iter()
                .map(|ext| normalize_extension(ext.as_ref()))
                .collect(),
            callback: Arc::new(callback),
        });
        self
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Feed one raw event
    pub fn push(&self, event: RawEvent) {
        if event.is_dir {
            return;
        }

        if event.kind == ChangeKind::Modified {
            if let Some(route) = &self.modified_route {
                if route.extensions.contains(&extension_of(&event.path)) {
                    (route.callback)(event.path);
                    return;
                }
            }
        }

        self.record(event.path);
    }

    /// Add a path to the pending set and restart the quiet period
    pub fn record(&self, path: PathBuf) {
        self.timer.cancel();

        match self.pending.lock() {
            Ok(mut pending) => {
                pending.insert(path);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(path);
            }
        }

        let pending = Arc::clone(&self.pending);
        let on_batch = Arc::clone(&self.on_batch);
        self.timer
            .arm(self.quiet_period, move || deliver(&pending, &on_batch));
    }

    /// Number of paths waiting for the timer
    pub fn pending_len(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Deliver whatever is pending right now
    pub fn flush(&self) {
        self.timer.cancel();
        deliver(&self.pending, &self.on_batch);
    }
}

fn deliver(pending: &Mutex<BTreeSet<PathBuf>>, on_batch: &BatchCallback) {
    let batch: Vec<PathBuf> = match pending.lock() {
        Ok(mut pending) => std::mem::take(&mut *pending).into_iter().collect(),
        Err(poisoned) => std::mem::take(&mut *poisoned.into_inner())
            .into_iter()
            .collect(),
    };

    if !batch.is_empty() {
        on_batch(batch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{unbounded, Receiver};

    const QUIET: Duration = Duration::from_millis(80);
    const WAIT: Duration = Duration::from_secs(3);

    fn batching_debouncer() -> (Debouncer, Receiver<Vec<PathBuf>>) {
        let (tx, rx) = unbounded();
        let debouncer = Debouncer::new(QUIET, move |batch| {
            let _ = tx.send(batch);
        });
        (debouncer, rx)
    }

    #[test]
    fn burst_for_one_path_yields_one_batch() {
        let (debouncer, rx) = batching_debouncer();

        for _ in 0..10 {
            debouncer.push(RawEvent::new("/watched/a.txt", ChangeKind::Modified));
        }

        let batch = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(batch, vec![PathBuf::from("/watched/a.txt")]);
        assert!(rx.recv_timeout(QUIET * 3).is_err());
    }

    #[test]
    fn distinct_paths_share_a_batch() {
        let (debouncer, rx) = batching_debouncer();

        debouncer.push(RawEvent::new("/watched/b.txt", ChangeKind::Created));
        debouncer.push(RawEvent::new("/watched/a.txt", ChangeKind::Created));
        debouncer.push(RawEvent::new("/watched/b.txt", ChangeKind::Removed));

        let batch = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(
            batch,
            vec![PathBuf::from("/watched/a.txt"), PathBuf::from("/watched/b.txt")]
        );
    }

    #[test]
    fn directory_events_are_ignored() {
        let (debouncer, rx) = batching_debouncer();

        debouncer.push(RawEvent::directory("/watched/sub", ChangeKind::Created));

        assert_eq!(debouncer.pending_len(), 0);
        assert!(rx.recv_timeout(QUIET * 3).is_err());
    }

    #[test]
    fn pending_set_is_cleared_after_delivery() {
        let (debouncer, rx) = batching_debouncer();

        debouncer.push(RawEvent::new("/watched/a.txt", ChangeKind::Created));
        rx.recv_timeout(WAIT).unwrap();
        assert_eq!(debouncer.pending_len(), 0);

        debouncer.push(RawEvent::new("/watched/c.txt", ChangeKind::Created));
        let second = rx.recv_timeout(WAIT).unwrap();
        assert_eq!(second, vec![PathBuf::from("/watched/c.txt")]);
    }

    #[test]
    fn flush_delivers_immediately() {
        let (debouncer, rx) = batching_debouncer();

        debouncer.record(PathBuf::from("/watched/a.txt"));
        debouncer.flush();

        assert_eq!(
            rx.try_recv().unwrap(),
            vec![PathBuf::from("/watched/a.txt")]
        );
        assert!(rx.recv_timeout(QUIET * 3).is_err());
    }

    #[test]
    fn versioned_modifications_take_their_own_route() {
        let (batch_tx, batch_rx) = unbounded();
        let (modified_tx, modified_rx) = unbounded();
        let debouncer = Debouncer::new(QUIET, move |batch| {
            let _ = batch_tx.send(batch);
        })
        .with_modified_route(["DOCX"], move |path| {
            let _ = modified_tx.send(path);
        });

        debouncer.push(RawEvent::new("/watched/report.docx", ChangeKind::Modified));
        debouncer.push(RawEvent::new("/watched/notes.txt", ChangeKind::Modified));
        debouncer.push(RawEvent::new("/watched/new.docx", ChangeKind::Created));

        assert_eq!(
            modified_rx.try_recv().unwrap(),
            PathBuf::from("/watched/report.docx")
        );
        let batch = batch_rx.recv_timeout(WAIT).unwrap();
        assert_eq!(
            batch,
            vec![PathBuf::from("/watched/new.docx"), PathBuf::from("/watched/notes.txt")]
        );
    }
}
