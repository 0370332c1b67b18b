//! # Resolver Module
//!
//! Splits a duplicate group into exactly one file to keep and the rest to delete.
//!
//! ## Ranking Modes
//! - **Attribute sort** - newest, oldest, largest, or smallest wins;
//!   names are sorted first so ties break deterministically
//! - **Weighted scoring** - five normalized factors combined by user weights;
//!   ties keep enumeration order
//!
//! Optionally, a group can be split by extension first so that one file per
//! extension survives.

mod scoring;

pub use scoring::{FileScorer, ScoreBreakdown, ScoreWeights, NEUTRAL_SCORE, RECENCY_WINDOW};

use crate::core::scanner::{extension_of, FileRecord};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Which attribute wins in attribute-sort mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeepPreference {
    #[default]
    Newest,
    Oldest,
    Largest,
    Smallest,
}

impl std::fmt::Display for KeepPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeepPreference::Newest => write!(f, "newest"),
            KeepPreference::Oldest => write!(f, "oldest"),
            KeepPreference::Largest => write!(f, "largest"),
            KeepPreference::Smallest => write!(f, "smallest"),
        }
    }
}

/// How to choose the survivor of a duplicate group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionPolicy {
    /// Used when scoring is disabled
    pub keep_preference: KeepPreference,
    /// Rank by weighted score instead of a single attribute
    pub scoring_enabled: bool,
    pub weights: ScoreWeights,
    /// Keep one survivor per extension instead of one overall
    pub group_by_extension: bool,
}

impl Default for ResolutionPolicy {
    fn default() -> Self {
        Self {
            keep_preference: KeepPreference::Newest,
            scoring_enabled: true,
            weights: ScoreWeights::default(),
            group_by_extension: false,
        }
    }
}

impl ResolutionPolicy {
    /// Attribute-sort policy
    pub fn keep(preference: KeepPreference) -> Self {
        Self {
            keep_preference: preference,
            scoring_enabled: false,
            ..Self::default()
        }
    }

    /// Weighted-scoring policy
    pub fn scored(weights: ScoreWeights) -> Self {
        Self {
            scoring_enabled: true,
            weights,
            ..Self::default()
        }
    }

    pub fn with_group_by_extension(mut self, enabled: bool) -> Self {
        self.group_by_extension = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()
    }
}

/// The keep/delete split of one duplicate group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Survivors: one, or one per extension in extension mode
    pub keep: Vec<PathBuf>,
    /// Everything else
    pub delete: Vec<PathBuf>,
}

/// Split `files` into one survivor and the rest.
///
/// With one file or none, everything is kept.
pub fn resolve(files: &[PathBuf], policy: &ResolutionPolicy) -> Resolution {
    if files.len() <= 1 {
        return Resolution {
            keep: files.to_vec(),
            delete: Vec::new(),
        };
    }

    let mut ranked = if policy.scoring_enabled {
        rank_by_score(files, policy.weights)
    } else {
        rank_by_attribute(files, policy.keep_preference)
    };

    let delete = ranked.split_off(1);
    Resolution {
        keep: ranked,
        delete,
    }
}

/// Resolve each extension sub-group independently.
///
/// Keeps exactly one file per distinct extension.
pub fn resolve_per_extension(files: &[PathBuf], policy: &ResolutionPolicy) -> Resolution {
    let mut by_extension: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for path in files {
        by_extension
            .entry(extension_of(path))
            .or_default()
            .push(path.clone());
    }

    let mut resolution = Resolution::default();
    for group in by_extension.values() {
        let part = resolve(group, policy);
        resolution.keep.extend(part.keep);
        resolution.delete.extend(part.delete);
    }
    resolution
}

/// Resolve using the variant the policy asks for
pub fn resolve_group(files: &[PathBuf], policy: &ResolutionPolicy) -> Resolution {
    if policy.group_by_extension {
        resolve_per_extension(files, policy)
    } else {
        resolve(files, policy)
    }
}

fn rank_by_score(files: &[PathBuf], weights: ScoreWeights) -> Vec<PathBuf> {
    let scorer = FileScorer::new(weights);
    let mut scored: Vec<(PathBuf, f64)> = files
        .iter()
        .map(|path| (path.clone(), scorer.score(path)))
        .collect();

    // Stable: equal scores keep enumeration order
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.into_iter().map(|(path, _)| path).collect()
}

fn rank_by_attribute(files: &[PathBuf], preference: KeepPreference) -> Vec<PathBuf> {
    // Files without readable metadata rank last so a vanished path is never kept
    let mut records: Vec<(PathBuf, Option<(SystemTime, u64)>)> = files
        .iter()
        .map(|path| match FileRecord::from_path(path) {
            Ok(record) => (path.clone(), Some((record.modified, record.size))),
            Err(e) => {
                tracing::debug!("No metadata for {}: {}", path.display(), e);
                (path.clone(), None)
            }
        })
        .collect();

    records.sort_by(|a, b| basename(&a.0).cmp(&basename(&b.0)));
    records.sort_by(|a, b| match (&a.1, &b.1) {
        (Some(left), Some(right)) => compare_attribute(left, right, preference),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    records.into_iter().map(|(path, _)| path).collect()
}

fn compare_attribute(
    a: &(SystemTime, u64),
    b: &(SystemTime, u64),
    preference: KeepPreference,
) -> Ordering {
    match preference {
        KeepPreference::Newest => b.0.cmp(&a.0),
        KeepPreference::Oldest => a.0.cmp(&b.0),
        KeepPreference::Largest => b.1.cmp(&a.1),
        KeepPreference::Smallest => a.1.cmp(&b.1),
    }
}

fn basename(path: &Path) -> std::ffi::OsString {
    path.file_name().map(|n| n.to_os_string()).unwrap_or_default()
}
