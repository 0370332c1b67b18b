//! # Folder Dedup
//!
//! Watches a folder and resolves duplicate files as they appear.
//!
//! ## Core Philosophy
//! - **Exact duplicates only** - files are grouped by a SHA-256 of their content
//! - **Exactly one survivor** - every duplicate group keeps one file
//! - **Never fatal** - a failing file or directory is logged and skipped
//!
//! ## Architecture
//! The library is split into a core engine (GUI-agnostic) and presentation layers:
//! - `core` - Filter, hasher, scanner, resolver, deleter, watcher, debouncer, monitor
//! - `events` - Log events and resolution reports for any UI
//! - `error` - Error taxonomy
//! - `cli` - Command-line interface (binary only)

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{DedupError, Result};

/// Initialize tracing for the library
///
/// This should be called by the application entry point (CLI or GUI).
pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global default tracing subscriber");
}
