//! Scan requests and monitor settings.

use crate::core::deleter::{DeleteMethod, DeleterConfig, LONG_PATH_THRESHOLD};
use crate::core::hasher::DEFAULT_CHUNK_SIZE;
use crate::core::resolver::ResolutionPolicy;
use crate::core::scanner::{FilterConfig, ScanConfig};
use crate::core::versioning::VersioningConfig;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What to watch and how to judge duplicates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanRequest {
    pub folder: PathBuf,
    pub filters: FilterConfig,
    pub policy: ResolutionPolicy,
}

impl ScanRequest {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            ..Self::default()
        }
    }

    pub fn with_filters(mut self, filters: FilterConfig) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_policy(mut self, policy: ResolutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Check the folder, the size bounds and the weights
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.folder.exists() {
            return Err(ConfigError::FolderNotFound {
                path: self.folder.clone(),
            });
        }
        if !self.folder.is_dir() {
            return Err(ConfigError::NotADirectory {
                path: self.folder.clone(),
            });
        }
        self.filters.validate()?;
        self.policy.validate()
    }
}

/// Everything the folder monitor needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub request: ScanRequest,
    pub delete_method: DeleteMethod,
    /// Deletion attempts per file
    pub max_retries: u32,
    /// Bytes read per hashing step
    pub chunk_size: usize,
    /// Quiet period before a batch of changes is processed
    pub debounce_ms: u64,
    /// Path components that mark cloud-synced folders
    pub cloud_sync_roots: Vec<String>,
    pub long_path_threshold: usize,
    /// Maximum walk depth below each scanned directory (None = unlimited)
    pub max_depth: Option<usize>,
    /// Resolve and log without deleting anything
    pub dry_run: bool,
    pub versioning: Option<VersioningConfig>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        let deleter = DeleterConfig::default();
        Self {
            request: ScanRequest::default(),
            delete_method: DeleteMethod::Trash,
            max_retries: deleter.max_retries,
            chunk_size: DEFAULT_CHUNK_SIZE,
            debounce_ms: 1000,
            cloud_sync_roots: deleter.cloud_sync_roots,
            long_path_threshold: LONG_PATH_THRESHOLD,
            max_depth: None,
            dry_run: false,
            versioning: None,
        }
    }
}

impl MonitorConfig {
    pub fn new(request: ScanRequest) -> Self {
        Self {
            request,
            ..Self::default()
        }
    }

    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidConfigFile {
            path: path.to_path_buf(),
            reason,
        };
        let text = fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| invalid(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.request.validate()?;
        if self.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        if self.max_retries == 0 {
            return Err(ConfigError::ZeroRetries);
        }
        if let Some(versioning) = &self.versioning {
            versioning.validate()?;
            // Backups inside the folder would be grouped with their originals
            let folder = resolve_path(&self.request.folder);
            if resolve_path(&versioning.backup_dir).starts_with(&folder) {
                return Err(ConfigError::BackupDirInsideFolder {
                    backup_dir: versioning.backup_dir.clone(),
                    folder: self.request.folder.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            max_depth: self.max_depth,
            chunk_size: self.chunk_size,
        }
    }

    pub fn deleter_config(&self) -> DeleterConfig {
        DeleterConfig {
            max_retries: self.max_retries,
            cloud_sync_roots: self.cloud_sync_roots.clone(),
            long_path_threshold: self.long_path_threshold,
            ..DeleterConfig::default()
        }
    }
}

/// Canonical form of `path`, resolving through its nearest existing ancestor
fn resolve_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut missing = Vec::new();
    let mut current = absolute.as_path();
    loop {
        if let Ok(canonical) = fs::canonicalize(current) {
            return missing.iter().rev().fold(canonical, |acc, part| acc.join(part));
        }
        match (current.file_name(), current.parent()) {
            (Some(name), Some(parent)) => {
                missing.push(name.to_os_string());
                current = parent;
            }
            _ => return absolute,
        }
    }
}
