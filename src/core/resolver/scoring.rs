//! Weighted multi-factor scoring of duplicate candidates.
//!
//! Each factor is normalized to `[0, 1]` on its own, then combined as a
//! weighted sum. Weights only matter relative to each other.

use crate::core::scanner::extension_of;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// Files older than this get no recency credit
pub const RECENCY_WINDOW: Duration = Duration::from_secs(60 * 60 * 24 * 30);

/// Score given to a file whose metadata could not be read
pub const NEUTRAL_SCORE: f64 = 0.5;

const SPECIAL_CHARS: &str = "!@#$%^&*()+=[]{}|;:'\",<>?`~";

/// Relative importance of each scoring factor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub recency: f64,
    pub size: f64,
    pub location: f64,
    pub extension: f64,
    pub name: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            recency: 0.3,
            size: 0.2,
            location: 0.2,
            extension: 0.1,
            name: 0.2,
        }
    }
}

impl ScoreWeights {
    /// All weights zero; combine with struct update syntax
    pub fn zero() -> Self {
        Self {
            recency: 0.0,
            size: 0.0,
            location: 0.0,
            extension: 0.0,
            name: 0.0,
        }
    }

    /// Every weight must be a finite, non-negative number
    pub fn validate(&self) -> Result<(), ConfigError> {
        let factors = [
            ("recency", self.recency),
            ("size", self.size),
            ("location", self.location),
            ("extension", self.extension),
            ("name", self.name),
        ];
        for (factor, value) in factors {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight { factor, value });
            }
        }
        Ok(())
    }
}

/// Per-factor values behind a composite score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub recency: f64,
    pub size: f64,
    pub location: f64,
    pub extension: f64,
    pub name: f64,
    /// Weighted sum of the factors above
    pub total: f64,
}

/// Scores files against a fixed reference time
#[derive(Debug, Clone)]
pub struct FileScorer {
    weights: ScoreWeights,
    now: SystemTime,
}

impl FileScorer {
    /// Score relative to the current time
    pub fn new(weights: ScoreWeights) -> Self {
        Self::at(weights, SystemTime::now())
    }

    /// Score relative to `now`
    pub fn at(weights: ScoreWeights, now: SystemTime) -> Self {
        Self { weights, now }
    }

    /// Composite score, or [`NEUTRAL_SCORE`] if the file can't be inspected
    pub fn score(&self, path: &Path) -> f64 {
        match self.breakdown(path) {
            Ok(breakdown) => breakdown.total,
            Err(e) => {
                tracing::debug!("Using neutral score for {}: {}", path.display(), e);
                NEUTRAL_SCORE
            }
        }
    }

    /// All factor values for `path`
    pub fn breakdown(&self, path: &Path) -> std::io::Result<ScoreBreakdown> {
        let metadata = fs::metadata(path)?;
        let modified = metadata.modified()?;

        let recency = self.recency_factor(modified);
        let size = size_factor(metadata.len());
        let location = location_factor(path);
        let extension = extension_factor(&extension_of(path));
        let name = name_factor(path);

        let w = &self.weights;
        let total = w.recency * recency
            + w.size * size
            + w.location * location
            + w.extension * extension
            + w.name * name;

        Ok(ScoreBreakdown {
            recency,
            size,
            location,
            extension,
            name,
            total,
        })
    }

    fn recency_factor(&self, modified: SystemTime) -> f64 {
        let age_secs = match self.now.duration_since(modified) {
            Ok(age) => age.as_secs_f64(),
            // Modified in the future relative to `now`
            Err(_) => 0.0,
        };
        (1.0 - age_secs / RECENCY_WINDOW.as_secs_f64()).clamp(0.0, 1.0)
    }
}

/// Log scale that reaches 1.0 around a terabyte
fn size_factor(size_bytes: u64) -> f64 {
    ((size_bytes as f64 + 1.0).log10() / 12.0).clamp(0.0, 1.0)
}

fn location_factor(path: &Path) -> f64 {
    let dir_name = path
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if dir_name.contains("download") {
        0.3
    } else if dir_name.contains("desktop") {
        0.2
    } else if dir_name.contains("documents") {
        0.8
    } else if dir_name.contains("pictures") {
        0.7
    } else {
        0.5
    }
}

fn extension_factor(extension: &str) -> f64 {
    match extension {
        ".doc" | ".docx" | ".pdf" | ".xls" | ".xlsx" => 0.9,
        ".jpg" | ".png" | ".gif" => 0.7,
        ".tmp" | ".bak" | ".old" => 0.1,
        _ => 0.5,
    }
}

/// Penalize each distinct special character in the file name
fn name_factor(path: &Path) -> f64 {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let distinct = SPECIAL_CHARS.chars().filter(|c| name.contains(*c)).count();
    (1.0 - distinct as f64 / 10.0).clamp(0.1, 1.0)
}
