//! Event type definitions for log and resolution reporting.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by the folder monitor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// A human-readable log line
    Log(LogEvent),
    /// File watcher lifecycle events
    Watcher(WatcherEvent),
    /// Duplicate resolution events
    Resolution(ResolutionEvent),
}

/// Severity of a [`LogEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Success,
    Debug,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warning => write!(f, "warning"),
            LogLevel::Error => write!(f, "error"),
            LogLevel::Success => write!(f, "success"),
            LogLevel::Debug => write!(f, "debug"),
        }
    }
}

/// A timestamped log line for the UI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEvent {
    /// Create a log event stamped with the current local time
    pub fn now(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            message: message.into(),
        }
    }
}

/// Events from the folder watcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WatcherEvent {
    /// Watcher started monitoring a folder
    Started { path: PathBuf },
    /// Watcher stopped monitoring a folder
    Stopped { path: PathBuf },
    /// A debounced batch of changed paths is ready
    BatchReady { paths: Vec<PathBuf> },
    /// An error occurred
    Error { message: String },
}

/// Events from duplicate resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResolutionEvent {
    /// One duplicate group was resolved
    GroupResolved(GroupOutcome),
    /// A resolution pass finished
    Completed(ResolutionReport),
}

/// What happened to a single duplicate group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupOutcome {
    /// Hex fingerprint shared by the group
    pub fingerprint: String,
    /// Survivors: one, or one per extension
    pub kept: Vec<PathBuf>,
    /// Files removed successfully
    pub deleted: Vec<PathBuf>,
    /// Files the deleter gave up on
    pub failed: Vec<PathBuf>,
}

/// Summary of one resolution pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionReport {
    /// Duplicate groups handed to the resolver
    pub groups_processed: usize,
    /// Files removed
    pub files_deleted: usize,
    /// Files that could not be removed
    pub failures: Vec<PathBuf>,
}

impl ResolutionReport {
    /// Record a single group's outcome
    pub fn record(&mut self, outcome: &GroupOutcome) {
        self.groups_processed += 1;
        self.files_deleted += outcome.deleted.len();
        self.failures.extend(outcome.failed.iter().cloned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_serializable() {
        let event = Event::Log(LogEvent::now(LogLevel::Success, "Keeping: a.txt"));

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"success\""));

        let deserialized: Event = serde_json::from_str(&json).unwrap();
        match deserialized {
            Event::Log(log) => {
                assert_eq!(log.level, LogLevel::Success);
                assert_eq!(log.message, "Keeping: a.txt");
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn report_uses_camel_case_fields() {
        let report = ResolutionReport {
            groups_processed: 2,
            files_deleted: 3,
            failures: vec![PathBuf::from("/locked.txt")],
        };

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("groupsProcessed"));
        assert!(json.contains("filesDeleted"));
    }

    #[test]
    fn report_records_group_outcomes() {
        let mut report = ResolutionReport::default();
        report.record(&GroupOutcome {
            fingerprint: "ab".into(),
            kept: vec![PathBuf::from("/a")],
            deleted: vec![PathBuf::from("/b"), PathBuf::from("/c")],
            failed: vec![PathBuf::from("/d")],
        });

        assert_eq!(report.groups_processed, 1);
        assert_eq!(report.files_deleted, 2);
        assert_eq!(report.failures, vec![PathBuf::from("/d")]);
    }
}
