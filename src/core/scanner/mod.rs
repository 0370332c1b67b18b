//! # Scanner Module
//!
//! Walks a folder, filters files, and groups them by content fingerprint.
//!
//! ## Pipeline
//! 1. **Walk** - recursive, never following directory symlinks
//! 2. **Filter** - existence, not-a-symlink, extension allow-list, size bounds
//! 3. **Hash** - SHA-256 fingerprint per surviving file (in parallel)
//! 4. **Group** - keep fingerprints shared by two or more files
//!
//! ## Example
//! ```rust,ignore
//! use folder_dedup::core::scanner::{DuplicateScanner, FilterConfig, ScanConfig};
//!
//! let scanner = DuplicateScanner::new(ScanConfig::default())?;
//! let groups = scanner.find_duplicates("/Users/me/Downloads".as_ref(), &FilterConfig::default())?;
//! ```

mod filter;
mod walker;

pub use filter::{normalize_extension, FileFilter, FilterConfig, SizeUnit};
pub use walker::{find_duplicates, DuplicateScanner, ScanConfig};

use crate::core::hasher::Fingerprint;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Filesystem facts about one file, read fresh for each pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modified time
    pub modified: SystemTime,
    /// Lower-cased extension with leading dot, or empty
    pub extension: String,
}

impl FileRecord {
    /// Read metadata for `path`
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = fs::metadata(path)?;
        let path = std::path::absolute(path)?;
        Ok(Self {
            extension: extension_of(&path),
            size: metadata.len(),
            modified: metadata.modified()?,
            path,
        })
    }
}

/// Two or more files sharing a fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Content fingerprint shared by every member
    pub fingerprint: Fingerprint,
    /// Member paths in traversal order
    pub paths: Vec<PathBuf>,
}

impl DuplicateGroup {
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Lower-cased extension of `path` with a leading dot (`.txt`), or `""`
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}
