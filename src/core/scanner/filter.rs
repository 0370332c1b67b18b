//! File filtering logic for the scanner.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use super::extension_of;

/// Unit for the numeric size bounds in [`FilterConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeUnit {
    Bytes,
    #[default]
    Kb,
    Mb,
    Gb,
}

impl SizeUnit {
    /// Number of bytes in one unit (1024-based)
    pub fn multiplier(&self) -> u64 {
        match self {
            SizeUnit::Bytes => 1,
            SizeUnit::Kb => 1024,
            SizeUnit::Mb => 1024 * 1024,
            SizeUnit::Gb => 1024 * 1024 * 1024,
        }
    }
}

impl std::fmt::Display for SizeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SizeUnit::Bytes => write!(f, "B"),
            SizeUnit::Kb => write!(f, "KB"),
            SizeUnit::Mb => write!(f, "MB"),
            SizeUnit::Gb => write!(f, "GB"),
        }
    }
}

/// User-facing filter settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// When false, only existence and not-a-symlink are checked
    pub enabled: bool,
    /// Allowed extensions such as `.jpg` (empty = allow all)
    pub extensions: BTreeSet<String>,
    /// Minimum size in `size_unit` (0 = unbounded)
    pub min_size: u64,
    /// Maximum size in `size_unit` (0 = unbounded)
    pub max_size: u64,
    pub size_unit: SizeUnit,
}

impl FilterConfig {
    /// An enabled filter with no constraints yet
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Restrict to the given extensions. Accepts `jpg`, `.jpg` or `.JPG`.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|ext| normalize_extension(ext.as_ref()))
            .filter(|ext| !ext.is_empty())
            .collect();
        self
    }

    pub fn with_size_bounds(mut self, min_size: u64, max_size: u64, unit: SizeUnit) -> Self {
        self.min_size = min_size;
        self.max_size = max_size;
        self.size_unit = unit;
        self
    }

    pub fn min_size_bytes(&self) -> u64 {
        self.min_size.saturating_mul(self.size_unit.multiplier())
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size.saturating_mul(self.size_unit.multiplier())
    }

    /// Reject min > max when both bounds are set
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_size != 0 && self.max_size != 0 && self.min_size > self.max_size {
            return Err(ConfigError::SizeBoundsInverted {
                min: self.min_size_bytes(),
                max: self.max_size_bytes(),
            });
        }
        Ok(())
    }
}

/// Lower-case an extension and give it a leading dot
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.is_empty() || ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

/// Decides whether a file is eligible for hashing
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    config: FilterConfig,
}

impl FileFilter {
    pub fn new(config: FilterConfig) -> Self {
        let extensions = config
            .extensions
            .iter()
            .map(|ext| normalize_extension(ext))
            .collect();
        Self {
            config: FilterConfig {
                extensions,
                ..config
            },
        }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Check if a file should be included.
    ///
    /// Missing files and symbolic links never pass.
    pub fn passes(&self, path: &Path) -> bool {
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(_) => return false,
        };
        if meta.file_type().is_symlink() || !meta.is_file() {
            return false;
        }

        if !self.config.enabled {
            return true;
        }

        if !self.config.extensions.is_empty()
            && !self.config.extensions.contains(&extension_of(path))
        {
            return false;
        }

        let size = meta.len();
        let min = self.config.min_size_bytes();
        let max = self.config.max_size_bytes();
        if min != 0 && size < min {
            return false;
        }
        if max != 0 && size > max {
            return false;
        }

        true
    }
}
