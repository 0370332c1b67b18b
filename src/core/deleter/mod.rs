//! # Deleter Module
//!
//! Removes duplicate files with retries, tolerating locked, read-only and
//! cloud-synced files.
//!
//! ## Per Attempt
//! 1. Absolutize the path (extended-length prefix on Windows for long paths)
//! 2. Already gone counts as success
//! 3. Under a cloud-sync root with a pending `.tmp` marker: wait once, then fail the attempt
//! 4. Make read-only files writable
//! 5. Best effort: open and close a delete-share handle to shake off stale locks
//! 6. Move to trash or unlink
//!
//! A failed attempt sleeps `1 + attempt` seconds before the next one.
//! [`SafeDeleter::safe_delete`] never returns an error, only `false`.

use crate::error::DeleteError;
use crate::events::{null_sender, EventSender};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Paths longer than this get the Windows extended-length prefix
pub const LONG_PATH_THRESHOLD: usize = 240;

/// How a duplicate is removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteMethod {
    /// Move to the recycle bin / trash (recoverable)
    #[default]
    #[serde(alias = "recycle")]
    Trash,
    /// Unlink immediately
    Permanent,
}

impl std::fmt::Display for DeleteMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeleteMethod::Trash => write!(f, "trash"),
            DeleteMethod::Permanent => write!(f, "permanent"),
        }
    }
}

/// Performs the final removal step
///
/// Implement this trait to substitute the filesystem (e.g., for testing).
pub trait Remover: Send + Sync {
    fn remove(&self, path: &Path, method: DeleteMethod) -> Result<(), DeleteError>;
}

/// Removes files through the `trash` crate or `std::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRemover;

impl Remover for SystemRemover {
    fn remove(&self, path: &Path, method: DeleteMethod) -> Result<(), DeleteError> {
        match method {
            DeleteMethod::Trash => trash::delete(path).map_err(|e| DeleteError::Trash {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            DeleteMethod::Permanent => match fs::remove_file(path) {
                Ok(()) => Ok(()),
                // A delete-on-close handle may already have removed it
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(source) => Err(DeleteError::Io {
                    path: path.to_path_buf(),
                    source,
                }),
            },
        }
    }
}

/// Sleeps between attempts; swap for a no-op in tests
pub type DelayFn = Arc<dyn Fn(Duration) + Send + Sync>;

/// Linear backoff: attempt 0 waits 1s, attempt 1 waits 2s, ...
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 + u64::from(attempt))
}

/// Configuration for the deleter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeleterConfig {
    /// Attempts before giving up
    pub max_retries: u32,
    /// Path components that mark a cloud-synced tree (substring match)
    pub cloud_sync_roots: Vec<String>,
    /// Wait before re-checking a pending sync marker
    pub sync_wait: Duration,
    pub long_path_threshold: usize,
}

impl Default for DeleterConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            cloud_sync_roots: vec!["OneDrive".to_string()],
            sync_wait: Duration::from_secs(2),
            long_path_threshold: LONG_PATH_THRESHOLD,
        }
    }
}

/// Retry-hardened file removal
#[derive(Clone)]
pub struct SafeDeleter {
    config: DeleterConfig,
    remover: Arc<dyn Remover>,
    delay: DelayFn,
}

impl Default for SafeDeleter {
    fn default() -> Self {
        Self::new(DeleterConfig::default())
    }
}

impl SafeDeleter {
    /// Create a deleter that really sleeps and really removes
    pub fn new(config: DeleterConfig) -> Self {
        Self {
            config,
            remover: Arc::new(SystemRemover),
            delay: Arc::new(std::thread::sleep),
        }
    }

    pub fn with_remover(mut self, remover: Arc<dyn Remover>) -> Self {
        self.remover = remover;
        self
    }

    pub fn with_delay(mut self, delay: DelayFn) -> Self {
        self.delay = delay;
        self
    }

    pub fn config(&self) -> &DeleterConfig {
        &self.config
    }

    /// Delete `path`, retrying with backoff. Returns whether it is gone.
    pub fn safe_delete(&self, path: &Path, method: DeleteMethod) -> bool {
        self.safe_delete_with_events(path, method, &null_sender())
    }

    /// Like [`safe_delete`](Self::safe_delete), tracing each failed attempt
    pub fn safe_delete_with_events(
        &self,
        path: &Path,
        method: DeleteMethod,
        events: &EventSender,
    ) -> bool {
        // At least one attempt, whatever the config says
        let attempts = self.config.max_retries.max(1);
        for attempt in 0..attempts {
            match self.attempt(path, method) {
                Ok(()) => return true,
                Err(e) => {
                    events.debug(format!(
                        "Delete attempt {}/{} failed: {}",
                        attempt + 1,
                        attempts,
                        e
                    ));
                    if attempt + 1 < attempts {
                        (self.delay)(backoff_delay(attempt));
                    }
                }
            }
        }

        events.debug(
            DeleteError::RetriesExhausted {
                path: path.to_path_buf(),
                attempts,
            }
            .to_string(),
        );
        false
    }

    /// Whether `path` lies inside a configured cloud-sync tree
    pub fn is_cloud_path(&self, path: &Path) -> bool {
        path.components().any(|component| {
            let component = component.as_os_str().to_string_lossy();
            self.config
                .cloud_sync_roots
                .iter()
                .any(|root| component.contains(root.as_str()))
        })
    }

    /// False while a `<file>.tmp` sync marker sits next to a cloud file
    pub fn is_cloud_synced(&self, path: &Path) -> bool {
        if !self.is_cloud_path(path) {
            return true;
        }
        let mut marker = path.as_os_str().to_os_string();
        marker.push(".tmp");
        !Path::new(&marker).exists()
    }

    fn attempt(&self, path: &Path, method: DeleteMethod) -> Result<(), DeleteError> {
        let path = self.normalize(path)?;

        let metadata = match fs::symlink_metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(source) => return Err(DeleteError::Io { path, source }),
        };

        if !self.is_cloud_synced(&path) {
            (self.delay)(self.config.sync_wait);
            if !self.is_cloud_synced(&path) {
                return Err(DeleteError::SyncPending { path });
            }
        }

        if !metadata.file_type().is_symlink() && metadata.permissions().readonly() {
            make_writable(&path)?;
        }

        release_lingering_handle(&path, method);

        self.remover.remove(&path, method)
    }

    fn normalize(&self, path: &Path) -> Result<PathBuf, DeleteError> {
        let absolute = std::path::absolute(path).map_err(|source| DeleteError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(long_path_form(absolute, self.config.long_path_threshold))
    }
}

/// Apply the platform's extended-length prefix when `path` is too long
#[cfg(windows)]
pub fn long_path_form(path: PathBuf, threshold: usize) -> PathBuf {
    const PREFIX: &str = r"\\?\";
    let text = path.as_os_str().to_string_lossy();
    if text.len() > threshold && !text.starts_with(PREFIX) {
        PathBuf::from(format!("{}{}", PREFIX, text))
    } else {
        path
    }
}

/// Apply the platform's extended-length prefix when `path` is too long
#[cfg(not(windows))]
pub fn long_path_form(path: PathBuf, _threshold: usize) -> PathBuf {
    path
}

#[cfg(unix)]
fn make_writable(path: &Path) -> Result<(), DeleteError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o777)).map_err(|source| {
        DeleteError::PermissionFix {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(not(unix))]
fn make_writable(path: &Path) -> Result<(), DeleteError> {
    let fix = |source| DeleteError::PermissionFix {
        path: path.to_path_buf(),
        source,
    };
    let mut permissions = fs::metadata(path).map_err(fix)?.permissions();
    permissions.set_readonly(false);
    fs::set_permissions(path, permissions).map_err(fix)
}

// Trash must not use delete-on-close or the file would skip the bin.
#[cfg(windows)]
fn release_lingering_handle(path: &Path, method: DeleteMethod) {
    use std::os::windows::fs::OpenOptionsExt;

    const FILE_SHARE_DELETE: u32 = 0x0000_0004;
    const FILE_FLAG_DELETE_ON_CLOSE: u32 = 0x0400_0000;

    let mut options = fs::OpenOptions::new();
    options.write(true).share_mode(FILE_SHARE_DELETE);
    if method == DeleteMethod::Permanent {
        options.custom_flags(FILE_FLAG_DELETE_ON_CLOSE);
    }
    if let Err(e) = options.open(path) {
        tracing::debug!("Could not open {} to release locks: {}", path.display(), e);
    }
}

#[cfg(not(windows))]
fn release_lingering_handle(_path: &Path, _method: DeleteMethod) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Fails a fixed number of times, then removes for real
    struct FlakyRemover {
        failures_left: AtomicU32,
        calls: AtomicU32,
    }

    impl FlakyRemover {
        fn new(failures: u32) -> Self {
            Self {
                failures_left: AtomicU32::new(failures),
                calls: AtomicU32::new(0),
            }
        }
    }

    impl Remover for FlakyRemover {
        fn remove(&self, path: &Path, _method: DeleteMethod) -> Result<(), DeleteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(DeleteError::Io {
                    path: path.to_path_buf(),
                    source: std::io::Error::new(ErrorKind::PermissionDenied, "locked"),
                });
            }
            fs::remove_file(path).map_err(|source| DeleteError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    }

    fn recording_delay() -> (DelayFn, Arc<Mutex<Vec<Duration>>>) {
        let recorded = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&recorded);
        let delay: DelayFn = Arc::new(move |d| sink.lock().unwrap().push(d));
        (delay, recorded)
    }

    fn create_file(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"duplicate").unwrap();
        path
    }

    #[test]
    fn nonexistent_path_is_success() {
        let (delay, recorded) = recording_delay();
        let deleter = SafeDeleter::default().with_delay(delay);

        assert!(deleter.safe_delete(Path::new("/nonexistent/file/12345.txt"), DeleteMethod::Permanent));
        assert!(recorded.lock().unwrap().is_empty());
    }

    #[test]
    fn zero_retries_still_attempts_once() {
        let config = DeleterConfig {
            max_retries: 0,
            ..DeleterConfig::default()
        };
        let deleter = SafeDeleter::new(config);
        assert!(deleter.safe_delete(Path::new("/nonexistent/file/12345.txt"), DeleteMethod::Permanent));

        let dir = TempDir::new().unwrap();
        let path = create_file(dir.path(), "dup.txt");
        assert!(deleter.safe_delete(&path, DeleteMethod::Permanent));
        assert!(!path.exists());
    }

    #[test]
    fn permanent_delete_removes_file() {
        let dir = TempDir::new().unwrap();
        let path = create_file(dir.path(), "dup.txt");

        assert!(SafeDeleter::default().safe_delete(&path, DeleteMethod::Permanent));
        assert!(!path.exists());
    }

    #[test]
    fn retries_with_linear_backoff_then_succeeds() {
        let dir = TempDir::new().unwrap();
        let path = create_file(dir.path(), "locked.txt");
        let remover = Arc::new(FlakyRemover::new(2));
        let (delay, recorded) = recording_delay();

        let deleter = SafeDeleter::default()
            .with_remover(remover.clone())
            .with_delay(delay);

        assert!(deleter.safe_delete(&path, DeleteMethod::Permanent));
        assert_eq!(remover.calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            *recorded.lock().unwrap(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
        assert!(!path.exists());
    }

    #[test]
    fn gives_up_after_max_retries() {
        let dir = TempDir::new().unwrap();
        let path = create_file(dir.path(), "stuck.txt");
        let remover = Arc::new(FlakyRemover::new(u32::MAX));
        let (delay, recorded) = recording_delay();

        let deleter = SafeDeleter::new(DeleterConfig {
            max_retries: 3,
            ..DeleterConfig::default()
        })
        .with_remover(remover.clone())
        .with_delay(delay);

        assert!(!deleter.safe_delete(&path, DeleteMethod::Trash));
        assert_eq!(remover.calls.load(Ordering::SeqCst), 3);
        assert_eq!(recorded.lock().unwrap().len(), 2);
        assert!(path.exists());
    }

    #[test]
    fn pending_cloud_sync_blocks_deletion() {
        let dir = TempDir::new().unwrap();
        let cloud = dir.path().join("OneDrive - Personal");
        fs::create_dir(&cloud).unwrap();
        let path = create_file(&cloud, "report.docx");
        create_file(&cloud, "report.docx.tmp");

        let remover = Arc::new(FlakyRemover::new(0));
        let (delay, recorded) = recording_delay();
        let deleter = SafeDeleter::new(DeleterConfig {
            max_retries: 2,
            ..DeleterConfig::default()
        })
        .with_remover(remover.clone())
        .with_delay(delay);

        assert!(!deleter.safe_delete(&path, DeleteMethod::Permanent));
        assert_eq!(remover.calls.load(Ordering::SeqCst), 0);
        assert!(path.exists());
        // Sync wait per attempt plus one backoff between them
        assert_eq!(
            *recorded.lock().unwrap(),
            vec![Duration::from_secs(2), Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[test]
    fn synced_cloud_file_is_deleted() {
        let dir = TempDir::new().unwrap();
        let cloud = dir.path().join("OneDrive");
        fs::create_dir(&cloud).unwrap();
        let path = create_file(&cloud, "notes.txt");

        let deleter = SafeDeleter::default();
        assert!(deleter.is_cloud_path(&path));
        assert!(deleter.is_cloud_synced(&path));
        assert!(deleter.safe_delete(&path, DeleteMethod::Permanent));
        assert!(!path.exists());
    }

    #[test]
    fn read_only_file_is_made_writable() {
        let dir = TempDir::new().unwrap();
        let path = create_file(dir.path(), "readonly.txt");
        let mut permissions = fs::metadata(&path).unwrap().permissions();
        permissions.set_readonly(true);
        fs::set_permissions(&path, permissions).unwrap();

        assert!(SafeDeleter::default().safe_delete(&path, DeleteMethod::Permanent));
        assert!(!path.exists());
    }

    #[test]
    fn backoff_is_linear() {
        assert_eq!(backoff_delay(0), Duration::from_secs(1));
        assert_eq!(backoff_delay(4), Duration::from_secs(5));
    }

    #[test]
    fn delete_method_accepts_recycle_alias() {
        let method: DeleteMethod = serde_json::from_str("\"recycle\"").unwrap();
        assert_eq!(method, DeleteMethod::Trash);
    }

    #[cfg(windows)]
    #[test]
    fn long_paths_get_extended_prefix() {
        let long = PathBuf::from(format!(r"C:\{}\file.txt", "a".repeat(250)));
        let short = PathBuf::from(r"C:\short\file.txt");

        assert!(long_path_form(long, LONG_PATH_THRESHOLD)
            .to_string_lossy()
            .starts_with(r"\\?\"));
        assert_eq!(long_path_form(short.clone(), LONG_PATH_THRESHOLD), short);
    }
}
