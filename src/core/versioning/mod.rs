//! # Versioning Module
//!
//! Keeps timestamped copies of watched files when their content changes.
//!
//! Backups are plain files named `<original name>.<YYYYMMDD_HHMMSS>` inside a
//! single directory. [`BackupStore::prune`] sweeps out copies older than the
//! retention window.

use crate::core::hasher::{ContentHasher, Fingerprint};
use crate::core::scanner::{extension_of, normalize_extension, FileFilter, FilterConfig};
use crate::error::{ConfigError, Result, VersionError};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};
use walkdir::WalkDir;

/// Suffix format appended to backup copies
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

static BACKUP_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.(\d{8}_\d{6})$").unwrap());

/// Which files get version backups and where they go
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersioningConfig {
    /// Extensions to back up on modification (".docx" form)
    pub extensions: BTreeSet<String>,
    pub backup_dir: PathBuf,
    /// Copies older than this many days are pruned
    pub retention_days: u32,
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            extensions: BTreeSet::new(),
            backup_dir: default_backup_dir(),
            retention_days: 30,
        }
    }
}

impl VersioningConfig {
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|ext| normalize_extension(ext.as_ref()))
            .collect();
        self
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.backup_dir.exists() && !self.backup_dir.is_dir() {
            return Err(ConfigError::NotADirectory {
                path: self.backup_dir.clone(),
            });
        }
        Ok(())
    }
}

/// `<local data dir>/folder-dedup/versions`
pub fn default_backup_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("folder-dedup")
        .join("versions")
}

/// A directory of timestamped copies
#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
    retention: chrono::Duration,
}

impl BackupStore {
    pub fn new(dir: impl Into<PathBuf>, retention_days: u32) -> Self {
        Self {
            dir: dir.into(),
            retention: chrono::Duration::days(i64::from(retention_days)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy `path` into the store, stamped with the current time
    pub fn backup(&self, path: &Path) -> std::result::Result<PathBuf, VersionError> {
        self.backup_at(path, Local::now())
    }

    /// Copy `path` into the store, stamped with `now`
    pub fn backup_at(
        &self,
        path: &Path,
        now: DateTime<Local>,
    ) -> std::result::Result<PathBuf, VersionError> {
        let name = path
            .file_name()
            .ok_or_else(|| VersionError::NoFileName {
                path: path.to_path_buf(),
            })?
            .to_string_lossy();

        fs::create_dir_all(&self.dir).map_err(|source| VersionError::CreateDir {
            path: self.dir.clone(),
            source,
        })?;

        let target = self
            .dir
            .join(format!("{}.{}", name, now.format(TIMESTAMP_FORMAT)));
        fs::copy(path, &target).map_err(|source| VersionError::Copy {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(target)
    }

    /// Remove copies older than the retention window. Returns how many went.
    pub fn prune(&self, now: DateTime<Local>) -> std::result::Result<usize, VersionError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(source) => {
                return Err(VersionError::ReadDir {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(stamp) = backup_time(&path) else {
                continue;
            };
            if now.signed_duration_since(stamp) > self.retention {
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => tracing::debug!("Could not prune {}: {}", path.display(), e),
                }
            }
        }

        Ok(removed)
    }

    /// Existing copies of a file, oldest first
    pub fn versions_of(&self, original: &Path) -> Vec<PathBuf> {
        let Some(name) = original.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            return Vec::new();
        };
        let prefix = format!("{}.", name);

        let mut versions: Vec<PathBuf> = fs::read_dir(&self.dir)
            .into_iter()
            .flatten()
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .map(|n| n.to_string_lossy())
                    .and_then(|n| n.strip_prefix(&prefix).map(|s| s.len() == 15))
                    .unwrap_or(false)
            })
            .collect();
        versions.sort();
        versions
    }
}

/// Parse the stamp out of a backup name, falling back to its mtime
fn backup_time(path: &Path) -> Option<DateTime<Local>> {
    let from_name = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .and_then(|name| {
            BACKUP_SUFFIX
                .captures(&name)
                .and_then(|c| NaiveDateTime::parse_from_str(&c[1], TIMESTAMP_FORMAT).ok())
        })
        .and_then(|naive| Local.from_local_datetime(&naive).earliest());

    from_name.or_else(|| {
        fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Local>::from)
    })
}

/// Backs up versioned files only when their content actually changed
pub struct VersionTracker {
    extensions: BTreeSet<String>,
    hasher: ContentHasher,
    known: Mutex<HashMap<PathBuf, Fingerprint>>,
    store: BackupStore,
}

impl VersionTracker {
    pub fn new(config: &VersioningConfig, hasher: ContentHasher) -> Self {
        Self {
            extensions: config.extensions.clone(),
            hasher,
            known: Mutex::new(HashMap::new()),
            store: BackupStore::new(config.backup_dir.clone(), config.retention_days),
        }
    }

    pub fn store(&self) -> &BackupStore {
        &self.store
    }

    /// Whether modifications to `path` are versioned
    pub fn tracks(&self, path: &Path) -> bool {
        self.extensions.contains(&extension_of(path))
    }

    /// Record current fingerprints of tracked files under `root` without backing up
    pub fn seed(&self, root: &Path) -> usize {
        let filter = FileFilter::new(FilterConfig::default());
        let mut seeded = 0;

        for entry in WalkDir::new(root).follow_links(false).into_iter().flatten() {
            let path = entry.path();
            if !self.tracks(path) || !filter.passes(path) {
                continue;
            }
            match self.hasher.hash_file(path) {
                Ok(fingerprint) => {
                    self.remember(path.to_path_buf(), fingerprint);
                    seeded += 1;
                }
                Err(e) => tracing::debug!("Skipping version seed: {}", e),
            }
        }

        seeded
    }

    /// Handle a modification. Returns the backup path when one was written.
    pub fn on_modified(&self, path: &Path) -> Result<Option<PathBuf>> {
        if !self.tracks(path) || !path.is_file() {
            return Ok(None);
        }

        let fingerprint = self.hasher.hash_file(path)?;
        if self.last_known(path) == Some(fingerprint) {
            return Ok(None);
        }

        let backup = self.store.backup(path)?;
        self.remember(path.to_path_buf(), fingerprint);
        Ok(Some(backup))
    }

    /// Forget a path (e.g., after it was deleted)
    pub fn forget(&self, path: &Path) {
        if let Ok(mut known) = self.known.lock() {
            known.remove(path);
        }
    }

    fn last_known(&self, path: &Path) -> Option<Fingerprint> {
        self.known.lock().ok().and_then(|known| known.get(path).copied())
    }

    fn remember(&self, path: PathBuf, fingerprint: Fingerprint) {
        if let Ok(mut known) = self.known.lock() {
            known.insert(path, fingerprint);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn tracker(dir: &TempDir) -> VersionTracker {
        let config = VersioningConfig {
            backup_dir: dir.path().join("versions"),
            ..VersioningConfig::default()
        }
        .with_extensions(["docx"]);
        VersionTracker::new(&config, ContentHasher::default())
    }

    #[test]
    fn backup_name_carries_timestamp() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("report.docx");
        fs::write(&source, b"v1").unwrap();
        let store = BackupStore::new(dir.path().join("versions"), 30);
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();

        let backup = store.backup_at(&source, now).unwrap();

        assert_eq!(backup.file_name().unwrap(), "report.docx.20240309_140507");
        assert_eq!(fs::read(&backup).unwrap(), b"v1");
    }

    #[test]
    fn prune_removes_only_expired_copies() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("report.docx");
        fs::write(&source, b"content").unwrap();
        let store = BackupStore::new(dir.path().join("versions"), 30);
        let now = Local.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        let old = store.backup_at(&source, now - Duration::days(45)).unwrap();
        let fresh = store.backup_at(&source, now - Duration::days(2)).unwrap();

        assert_eq!(store.prune(now).unwrap(), 1);
        assert!(!old.exists());
        assert!(fresh.exists());
        assert_eq!(store.versions_of(&source), vec![fresh]);
    }

    #[test]
    fn prune_on_missing_store_is_noop() {
        let dir = TempDir::new().unwrap();
        let store = BackupStore::new(dir.path().join("never-created"), 30);
        assert_eq!(store.prune(Local::now()).unwrap(), 0);
    }

    #[test]
    fn unchanged_content_is_not_backed_up_twice() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);
        let doc = dir.path().join("plan.docx");
        fs::write(&doc, b"draft").unwrap();

        assert!(tracker.on_modified(&doc).unwrap().is_some());
        assert!(tracker.on_modified(&doc).unwrap().is_none());
    }

    #[test]
    fn seeded_files_back_up_only_after_a_change() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);
        let doc = dir.path().join("plan.docx");
        fs::write(&doc, b"draft").unwrap();

        assert_eq!(tracker.seed(dir.path()), 1);
        assert!(tracker.on_modified(&doc).unwrap().is_none());

        fs::write(&doc, b"final").unwrap();
        let backup = tracker.on_modified(&doc).unwrap().unwrap();
        assert_eq!(fs::read(backup).unwrap(), b"final");
    }

    #[test]
    fn untracked_extensions_are_ignored() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker(&dir);
        let note = dir.path().join("note.txt");
        fs::write(&note, b"text").unwrap();

        assert!(!tracker.tracks(&note));
        assert!(tracker.on_modified(&note).unwrap().is_none());
    }

    #[test]
    fn backup_time_falls_back_to_mtime() {
        let dir = TempDir::new().unwrap();
        let stray = dir.path().join("stray.bak");
        fs::write(&stray, b"x").unwrap();

        assert!(backup_time(&stray).is_some());
    }
}
