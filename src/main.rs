//! # folder-dedup CLI
//!
//! Command-line front end for the live duplicate resolver.
//!
//! ## Usage
//! ```bash
//! folder-dedup scan ~/Downloads --dry-run
//! folder-dedup watch ~/Downloads --keep newest --no-scoring
//! ```

mod cli;

use folder_dedup::Result;

fn main() -> Result<()> {
    folder_dedup::init_tracing();
    cli::run()
}
