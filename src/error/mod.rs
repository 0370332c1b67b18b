//! # Error Module
//!
//! Error types for the folder dedup engine.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths, file names, what went wrong
//! - **Degrade, don't abort** - per-file errors are logged and the file skipped

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum DedupError {
    #[error("Scanning error: {0}")]
    Scan(#[from] ScanError),

    #[error("Hashing error: {0}")]
    Hash(#[from] HashError),

    #[error("Deletion error: {0}")]
    Delete(#[from] DeleteError),

    #[error("Watcher error: {0}")]
    Watch(#[from] WatcherError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Version backup error: {0}")]
    Version(#[from] VersionError),

    #[error("A duplicate resolution pass is already running")]
    Busy,
}

/// Errors that occur while walking a directory tree
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Permission denied accessing: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Failed to read directory {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that occur while fingerprinting a file
#[derive(Error, Debug)]
pub enum HashError {
    #[error("Failed to hash {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Chunk size must be greater than zero")]
    ZeroChunkSize,
}

/// Errors from a single deletion attempt
///
/// These never escape [`crate::core::deleter::SafeDeleter::safe_delete`];
/// they are logged and drive the retry loop.
#[derive(Error, Debug)]
pub enum DeleteError {
    #[error("Cloud sync still in progress for {path}")]
    SyncPending { path: PathBuf },

    #[error("Could not make {path} writable: {source}")]
    PermissionFix {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Moving {path} to trash failed: {message}")]
    Trash { path: PathBuf, message: String },

    #[error("Failed to remove {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Gave up deleting {path} after {attempts} attempts")]
    RetriesExhausted { path: PathBuf, attempts: u32 },
}

/// Errors that occur while watching a folder
#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("Failed to initialize watcher: {0}")]
    InitFailed(String),

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Failed to watch {path}: {reason}")]
    WatchFailed { path: PathBuf, reason: String },

    #[error("Monitoring is already running")]
    AlreadyRunning,
}

/// Invalid filter, policy, or monitor configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Minimum size {min} is larger than maximum size {max}")]
    SizeBoundsInverted { min: u64, max: u64 },

    #[error("Weight for {factor} must be a non-negative number, got {value}")]
    InvalidWeight { factor: &'static str, value: f64 },

    #[error("Chunk size must be greater than zero")]
    ZeroChunkSize,

    #[error("Delete retries must be at least 1")]
    ZeroRetries,

    #[error("Backup directory {backup_dir} is inside the watched folder {folder}")]
    BackupDirInsideFolder { backup_dir: PathBuf, folder: PathBuf },

    #[error("Folder not found: {path}")]
    FolderNotFound { path: PathBuf },

    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("Invalid config file {path}: {reason}")]
    InvalidConfigFile { path: PathBuf, reason: String },
}

/// Errors from the version backup store
#[derive(Error, Debug)]
pub enum VersionError {
    #[error("Failed to create backup directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to back up {path}: {source}")]
    Copy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Path has no file name: {path}")]
    NoFileName { path: PathBuf },

    #[error("Failed to read backup directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, DedupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_error_includes_path() {
        let error = HashError::Io {
            path: PathBuf::from("/data/report.pdf"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let message = error.to_string();
        assert!(message.contains("/data/report.pdf"));
        assert!(message.contains("denied"));
    }

    #[test]
    fn size_bounds_error_names_both_bounds() {
        let error = ConfigError::SizeBoundsInverted { min: 10, max: 5 };
        let message = error.to_string();
        assert!(message.contains("10"));
        assert!(message.contains('5'));
    }

    #[test]
    fn config_error_converts_to_top_level() {
        let error: DedupError = ConfigError::ZeroChunkSize.into();
        assert!(matches!(error, DedupError::Config(ConfigError::ZeroChunkSize)));
    }
}
