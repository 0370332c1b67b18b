//! # Core Module
//!
//! The GUI-agnostic duplicate detection and resolution engine.
//!
//! ## Modules
//! - `hasher` - Streams files through SHA-256
//! - `scanner` - Filters, walks and groups files by fingerprint
//! - `resolver` - Picks the survivor of each duplicate group
//! - `deleter` - Removes duplicates with retries and backoff
//! - `watcher` - Subscribes to filesystem notifications
//! - `debouncer` - Collapses event bursts into batches
//! - `versioning` - Timestamped backups of modified files
//! - `monitor` - Orchestrates the live pipeline

pub mod debouncer;
pub mod deleter;
pub mod hasher;
pub mod monitor;
pub mod resolver;
pub mod scanner;
pub mod versioning;
pub mod watcher;

// Re-export commonly used types
pub use deleter::{DeleteMethod, SafeDeleter};
pub use hasher::{ContentHasher, Fingerprint};
pub use monitor::{FolderMonitor, MonitorConfig, ScanRequest};
pub use resolver::{resolve, KeepPreference, Resolution, ResolutionPolicy, ScoreWeights};
pub use scanner::{find_duplicates, DuplicateGroup, DuplicateScanner, FileRecord, FilterConfig};
