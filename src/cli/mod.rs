//! # CLI Module
//!
//! Command-line interface for the folder dedup engine.
//!
//! ## Usage
//! ```bash
//! # One pass over a folder, moving duplicates to the trash
//! folder-dedup scan ~/Downloads
//!
//! # Preview what would go, keeping the oldest copy of each .jpg
//! folder-dedup scan ~/Pictures --ext jpg --keep oldest --no-scoring --dry-run
//!
//! # Watch until Ctrl+C, backing up edited documents
//! folder-dedup watch ~/Documents --version-ext docx --version-ext xlsx
//!
//! # Which extensions exist (for --ext)
//! folder-dedup extensions ~/Downloads --output json
//!
//! # Why one copy beats another
//! folder-dedup score ~/Downloads/report.pdf ~/Documents/report.pdf
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use console::{style, Term};
use folder_dedup::core::deleter::DeleteMethod;
use folder_dedup::core::monitor::{FolderMonitor, MonitorConfig};
use folder_dedup::core::resolver::{FileScorer, KeepPreference, ScoreWeights};
use folder_dedup::core::scanner::{normalize_extension, DuplicateScanner, SizeUnit};
use folder_dedup::error::{Result, WatcherError};
use folder_dedup::events::{
    Event, EventChannel, EventReceiver, GroupOutcome, LogEvent, LogLevel, ResolutionEvent,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Folder Dedup - Keep one copy, automatically
#[derive(Parser, Debug)]
#[command(name = "folder-dedup")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve duplicates in a folder once
    Scan {
        /// Folder to scan
        folder: PathBuf,

        #[command(flatten)]
        engine: EngineArgs,

        /// Report what would be deleted without deleting
        #[arg(long)]
        dry_run: bool,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,

        /// Show debug log lines
        #[arg(short, long)]
        verbose: bool,
    },

    /// Watch a folder and resolve duplicates as they appear (Ctrl+C to stop)
    Watch {
        /// Folder to watch
        folder: PathBuf,

        #[command(flatten)]
        engine: EngineArgs,

        /// Quiet period before a burst of changes is processed
        #[arg(long)]
        debounce_ms: Option<u64>,

        /// Back up files with this extension when they change (repeatable)
        #[arg(long = "version-ext")]
        version_ext: Vec<String>,

        /// Where version backups are written
        #[arg(long)]
        backup_dir: Option<PathBuf>,

        /// Days to keep version backups
        #[arg(long)]
        retention_days: Option<u32>,

        /// Log what would be deleted without deleting
        #[arg(long)]
        dry_run: bool,

        /// Show debug log lines
        #[arg(short, long)]
        verbose: bool,
    },

    /// List the file extensions present in a folder
    Extensions {
        /// Folder to inspect
        folder: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },

    /// Show the weighted score breakdown for files
    Score {
        /// Files to score
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        weights: WeightArgs,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },
}

/// Filter, policy and deletion flags shared by `scan` and `watch`
#[derive(Args, Debug)]
struct EngineArgs {
    /// JSON config file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only consider these extensions (comma separated or repeated)
    #[arg(long = "ext", value_delimiter = ',')]
    extensions: Vec<String>,

    /// Minimum file size
    #[arg(long)]
    min_size: Option<u64>,

    /// Maximum file size (0 = unbounded)
    #[arg(long)]
    max_size: Option<u64>,

    /// Unit for --min-size / --max-size
    #[arg(long)]
    unit: Option<Unit>,

    /// Which copy survives when scoring is off
    #[arg(long)]
    keep: Option<Keep>,

    /// Rank by a single attribute (--keep) instead of weighted score
    #[arg(long)]
    no_scoring: bool,

    #[command(flatten)]
    weights: WeightArgs,

    /// Keep one copy per extension instead of one overall
    #[arg(long)]
    per_extension: bool,

    /// Unlink instead of moving to the trash
    #[arg(long)]
    permanent: bool,

    /// Deletion attempts per file
    #[arg(long)]
    retries: Option<u32>,

    /// Maximum directory depth to scan
    #[arg(long)]
    max_depth: Option<usize>,
}

/// Scoring weights; unset weights keep their defaults
#[derive(Args, Debug)]
struct WeightArgs {
    #[arg(long)]
    weight_recency: Option<f64>,
    #[arg(long)]
    weight_size: Option<f64>,
    #[arg(long)]
    weight_location: Option<f64>,
    #[arg(long)]
    weight_extension: Option<f64>,
    #[arg(long)]
    weight_name: Option<f64>,
}

impl WeightArgs {
    fn apply(&self, mut weights: ScoreWeights) -> ScoreWeights {
        if let Some(w) = self.weight_recency {
            weights.recency = w;
        }
        if let Some(w) = self.weight_size {
            weights.size = w;
        }
        if let Some(w) = self.weight_location {
            weights.location = w;
        }
        if let Some(w) = self.weight_extension {
            weights.extension = w;
        }
        if let Some(w) = self.weight_name {
            weights.name = w;
        }
        weights
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Keep {
    Newest,
    Oldest,
    Largest,
    Smallest,
}

impl From<Keep> for KeepPreference {
    fn from(keep: Keep) -> Self {
        match keep {
            Keep::Newest => KeepPreference::Newest,
            Keep::Oldest => KeepPreference::Oldest,
            Keep::Largest => KeepPreference::Largest,
            Keep::Smallest => KeepPreference::Smallest,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Unit {
    Bytes,
    Kb,
    Mb,
    Gb,
}

impl From<Unit> for SizeUnit {
    fn from(unit: Unit) -> Self {
        match unit {
            Unit::Bytes => SizeUnit::Bytes,
            Unit::Kb => SizeUnit::Kb,
            Unit::Mb => SizeUnit::Mb,
            Unit::Gb => SizeUnit::Gb,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            folder,
            engine,
            dry_run,
            output,
            verbose,
        } => {
            let mut config = engine.into_config(folder)?;
            config.dry_run = dry_run;
            run_scan(config, output, verbose)
        }
        Commands::Watch {
            folder,
            engine,
            debounce_ms,
            version_ext,
            backup_dir,
            retention_days,
            dry_run,
            verbose,
        } => {
            let mut config = engine.into_config(folder)?;
            config.dry_run = dry_run;
            if let Some(ms) = debounce_ms {
                config.debounce_ms = ms;
            }
            if !version_ext.is_empty() {
                let mut versioning = config
                    .versioning
                    .take()
                    .unwrap_or_default()
                    .with_extensions(&version_ext);
                if let Some(dir) = backup_dir {
                    versioning.backup_dir = dir;
                }
                if let Some(days) = retention_days {
                    versioning.retention_days = days;
                }
                config.versioning = Some(versioning);
            }
            run_watch(config, verbose)
        }
        Commands::Extensions { folder, output } => run_extensions(&folder, output),
        Commands::Score {
            files,
            weights,
            output,
        } => run_score(&files, weights.apply(ScoreWeights::default()), output),
    }
}

impl EngineArgs {
    fn into_config(self, folder: PathBuf) -> Result<MonitorConfig> {
        let mut config = match &self.config {
            Some(path) => MonitorConfig::from_json_file(path)?,
            None => MonitorConfig::default(),
        };
        config.request.folder = folder;

        let filters = &mut config.request.filters;
        if !self.extensions.is_empty() {
            filters.extensions = self
                .extensions
                .iter()
                .map(|ext| normalize_extension(ext))
                .filter(|ext| !ext.is_empty())
                .collect();
            filters.enabled = true;
        }
        if let Some(min) = self.min_size {
            filters.min_size = min;
            filters.enabled = true;
        }
        if let Some(max) = self.max_size {
            filters.max_size = max;
            filters.enabled = true;
        }
        if let Some(unit) = self.unit {
            filters.size_unit = unit.into();
        }

        let policy = &mut config.request.policy;
        if let Some(keep) = self.keep {
            policy.keep_preference = keep.into();
        }
        if self.no_scoring {
            policy.scoring_enabled = false;
        }
        if self.per_extension {
            policy.group_by_extension = true;
        }
        policy.weights = self.weights.apply(policy.weights);

        if self.permanent {
            config.delete_method = DeleteMethod::Permanent;
        }
        if let Some(retries) = self.retries {
            config.max_retries = retries;
        }
        if self.max_depth.is_some() {
            config.max_depth = self.max_depth;
        }

        Ok(config)
    }
}

fn run_scan(config: MonitorConfig, output: OutputFormat, verbose: bool) -> Result<()> {
    let term = Term::stderr();
    let pretty = output == OutputFormat::Pretty;

    if pretty {
        print_header(&term, &config);
    }

    let (sender, receiver) = EventChannel::new();
    let monitor = FolderMonitor::new(config, sender)?;

    let spinner = if pretty {
        let pb = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner_style);
        }
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message("Scanning...");
        Some(pb)
    } else {
        None
    };

    let spinner_clone = spinner.clone();
    let event_thread = thread::spawn(move || collect_outcomes(receiver, spinner_clone, verbose));

    let result = monitor.scan_now();

    // Dropping the monitor drops the last sender
    drop(monitor);
    let outcomes = event_thread.join().unwrap_or_default();
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let report = result?;

    match output {
        OutputFormat::Pretty => {
            print_outcomes(&term, &outcomes);
            term.write_line("").ok();
            term.write_line(&format!(
                "{} {} groups processed, {} files deleted, {} failures",
                style("✓").green().bold(),
                style(report.groups_processed).cyan(),
                style(report.files_deleted).cyan(),
                style(report.failures.len()).red()
            ))
            .ok();
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "report": report,
                "groups": outcomes,
            });
            if let Ok(json) = serde_json::to_string_pretty(&output) {
                println!("{}", json);
            }
        }
    }

    Ok(())
}

fn collect_outcomes(
    receiver: EventReceiver,
    spinner: Option<ProgressBar>,
    verbose: bool,
) -> Vec<GroupOutcome> {
    let mut outcomes = Vec::new();
    for event in receiver.iter() {
        match event {
            Event::Log(log) => {
                if let Some(ref pb) = spinner {
                    if log.level != LogLevel::Debug || verbose {
                        pb.println(format_log(&log));
                    }
                }
            }
            Event::Resolution(ResolutionEvent::GroupResolved(outcome)) => {
                outcomes.push(outcome);
            }
            _ => {}
        }
    }
    outcomes
}

fn run_watch(config: MonitorConfig, verbose: bool) -> Result<()> {
    let term = Term::stderr();
    print_header(&term, &config);

    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })
    .map_err(|e| WatcherError::InitFailed(e.to_string()))?;

    let (sender, receiver) = EventChannel::new();
    let mut monitor = FolderMonitor::new(config, sender)?;
    monitor.start()?;

    term.write_line(&format!("{}", style("Press Ctrl+C to stop").dim()))
        .ok();

    while shutdown_rx.try_recv().is_err() {
        if let Some(event) = receiver.recv_timeout(Duration::from_millis(200)) {
            print_event(&term, &event, verbose);
        }
    }

    monitor.stop();
    for event in receiver.drain() {
        print_event(&term, &event, verbose);
    }

    Ok(())
}

fn run_extensions(folder: &Path, output: OutputFormat) -> Result<()> {
    let extensions = DuplicateScanner::default().available_extensions(folder)?;

    match output {
        OutputFormat::Pretty => {
            let term = Term::stdout();
            term.write_line(&format!(
                "{} file extensions in {}",
                style(extensions.len()).cyan(),
                folder.display()
            ))
            .ok();
            for ext in &extensions {
                let label = if ext.is_empty() { "(none)" } else { ext.as_str() };
                term.write_line(&format!("  {}", label)).ok();
            }
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(&extensions) {
                println!("{}", json);
            }
        }
    }

    Ok(())
}

fn run_score(files: &[PathBuf], weights: ScoreWeights, output: OutputFormat) -> Result<()> {
    weights.validate()?;
    let scorer = FileScorer::new(weights);

    let mut rows: Vec<_> = files
        .iter()
        .filter_map(|path| match scorer.breakdown(path) {
            Ok(breakdown) => Some((path, breakdown)),
            Err(e) => {
                eprintln!("{} {}: {}", style("!").yellow(), path.display(), e);
                None
            }
        })
        .collect();
    rows.sort_by(|a, b| b.1.total.total_cmp(&a.1.total));

    match output {
        OutputFormat::Pretty => {
            let term = Term::stdout();
            term.write_line(&format!(
                "{:>7} {:>7} {:>7} {:>7} {:>7} {:>7}  {}",
                "total", "recency", "size", "place", "ext", "name", "file"
            ))
            .ok();
            for (rank, (path, b)) in rows.iter().enumerate() {
                let marker = if rank == 0 {
                    style("★").green().to_string()
                } else {
                    style("○").dim().to_string()
                };
                term.write_line(&format!(
                    "{:>7.3} {:>7.3} {:>7.3} {:>7.3} {:>7.3} {:>7.3}  {} {}",
                    b.total,
                    b.recency,
                    b.size,
                    b.location,
                    b.extension,
                    b.name,
                    marker,
                    path.display()
                ))
                .ok();
            }
        }
        OutputFormat::Json => {
            let output: Vec<_> = rows
                .iter()
                .map(|(path, breakdown)| serde_json::json!({ "path": path, "score": breakdown }))
                .collect();
            if let Ok(json) = serde_json::to_string_pretty(&output) {
                println!("{}", json);
            }
        }
    }

    Ok(())
}

fn print_header(term: &Term, config: &MonitorConfig) {
    term.write_line(&format!(
        "{} {}",
        style("Folder Dedup").bold().cyan(),
        style(concat!("v", env!("CARGO_PKG_VERSION"))).dim()
    ))
    .ok();

    let policy = &config.request.policy;
    let ranking = if policy.scoring_enabled {
        "weighted score".to_string()
    } else {
        format!("keep {}", policy.keep_preference)
    };
    let mode = if config.dry_run {
        "dry run".to_string()
    } else {
        config.delete_method.to_string()
    };
    term.write_line(&format!(
        "  {} {}  ({}, {})",
        style("Folder:").dim(),
        config.request.folder.display(),
        ranking,
        mode
    ))
    .ok();
    term.write_line("").ok();
}

fn print_event(term: &Term, event: &Event, verbose: bool) {
    if let Event::Log(log) = event {
        if log.level != LogLevel::Debug || verbose {
            term.write_line(&format_log(log)).ok();
        }
    }
}

fn format_log(log: &LogEvent) -> String {
    let time = log.timestamp.format("%H:%M:%S");
    let level = match log.level {
        LogLevel::Info => style("info").blue(),
        LogLevel::Warning => style("warn").yellow(),
        LogLevel::Error => style("error").red().bold(),
        LogLevel::Success => style("ok").green(),
        LogLevel::Debug => style("debug").dim(),
    };
    format!("{} {:>5} {}", style(time).dim(), level, log.message)
}

fn print_outcomes(term: &Term, outcomes: &[GroupOutcome]) {
    if outcomes.is_empty() {
        term.write_line(&format!("  {} No duplicates found!", style("🎉").green()))
            .ok();
        return;
    }

    term.write_line("").ok();
    term.write_line(&format!("{}", style("Duplicate Groups:").bold().underlined()))
        .ok();

    for (i, outcome) in outcomes.iter().enumerate() {
        term.write_line(&format!(
            "  {} {}",
            style(format!("Group {}:", i + 1)).bold(),
            style(&outcome.fingerprint[..8.min(outcome.fingerprint.len())]).dim()
        ))
        .ok();
        for path in &outcome.kept {
            term.write_line(&format!("    {} {}", style("★").green(), display_path(path)))
                .ok();
        }
        for path in &outcome.deleted {
            term.write_line(&format!("    {} {}", style("✗").dim(), display_path(path)))
                .ok();
        }
        for path in &outcome.failed {
            term.write_line(&format!("    {} {}", style("!").red(), display_path(path)))
                .ok();
        }
    }
}

fn display_path(path: &Path) -> String {
    match dirs::home_dir().and_then(|home| path.strip_prefix(home).ok().map(Path::to_path_buf)) {
        Some(relative) => format!("~/{}", relative.display()),
        None => path.display().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folder_dedup::core::versioning::VersioningConfig;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "folder-dedup",
            "scan",
            "/data",
            "--ext",
            "JPG,png",
            "--min-size",
            "10",
            "--unit",
            "mb",
            "--keep",
            "oldest",
            "--no-scoring",
            "--permanent",
        ]);

        let Commands::Scan { engine, .. } = cli.command else {
            panic!("expected scan");
        };
        let config = engine.into_config(PathBuf::from("/data")).unwrap();

        let filters = &config.request.filters;
        assert!(filters.enabled);
        assert!(filters.extensions.contains(".jpg"));
        assert!(filters.extensions.contains(".png"));
        assert_eq!(filters.min_size_bytes(), 10 * 1024 * 1024);
        assert_eq!(config.request.policy.keep_preference, KeepPreference::Oldest);
        assert!(!config.request.policy.scoring_enabled);
        assert_eq!(config.delete_method, DeleteMethod::Permanent);
    }

    #[test]
    fn weight_flags_replace_only_named_weights() {
        let args = WeightArgs {
            weight_recency: Some(1.0),
            weight_size: Some(0.0),
            weight_location: None,
            weight_extension: None,
            weight_name: None,
        };
        let weights = args.apply(ScoreWeights::default());

        assert_eq!(weights.recency, 1.0);
        assert_eq!(weights.size, 0.0);
        assert_eq!(weights.location, ScoreWeights::default().location);
    }

    #[test]
    fn versioning_defaults_apply_to_watch() {
        let cli = Cli::parse_from([
            "folder-dedup",
            "watch",
            "/data",
            "--version-ext",
            "docx",
        ]);
        let Commands::Watch { version_ext, .. } = cli.command else {
            panic!("expected watch");
        };
        let versioning = VersioningConfig::default().with_extensions(&version_ext);
        assert!(versioning.extensions.contains(".docx"));
        assert_eq!(versioning.retention_days, 30);
    }
}
