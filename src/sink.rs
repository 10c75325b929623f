//! Logging sink consumed by the reconciler.
//!
//! The reconciler emits one [`LogRecord`] per applied action and per error.
//! Where the records end up is the sink's business: [`TracingSink`] forwards
//! them to whatever `tracing` subscriber the process installed, and
//! [`MemorySink`] keeps them for assertions in tests.

use crate::error::SyncError;
use crate::plan::SyncAction;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Mutex;
use tracing::{error, info};

/// Severity of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// An action was applied (or planned, in dry-run mode)
    Info,
    /// Something failed for a path
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "INFO",
            Self::Error => "ERROR",
        })
    }
}

/// One structured log record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Severity
    pub severity: Severity,
    /// Human-readable message
    pub message: String,
    /// Relative path the record concerns, if any
    pub path: Option<String>,
    /// When the record was produced
    pub timestamp: DateTime<Utc>,
}

impl LogRecord {
    /// Record for an applied action
    #[must_use]
    pub fn applied(action: &SyncAction) -> Self {
        let verb = match action {
            SyncAction::Copy(_) => "Copied",
            SyncAction::Delete(_) => "Deleted",
        };
        Self::new(
            Severity::Info,
            format!("{verb} '{}'", action.path()),
            Some(action.path().to_string()),
        )
    }

    /// Record for an action that dry-run mode skipped
    #[must_use]
    pub fn planned(action: &SyncAction) -> Self {
        let verb = match action {
            SyncAction::Copy(_) => "Would copy",
            SyncAction::Delete(_) => "Would delete",
        };
        Self::new(
            Severity::Info,
            format!("{verb} '{}'", action.path()),
            Some(action.path().to_string()),
        )
    }

    /// Record for a per-path failure
    #[must_use]
    pub fn failed(error: &SyncError) -> Self {
        Self::new(
            Severity::Error,
            error.to_string(),
            Some(error.path().to_string()),
        )
    }

    fn new(severity: Severity, message: String, path: Option<String>) -> Self {
        Self {
            severity,
            message,
            path,
            timestamp: Utc::now(),
        }
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:>5} {}",
            self.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            self.severity,
            self.message
        )
    }
}

/// Destination for reconciliation records
pub trait SyncSink: Send + Sync {
    /// Accept one record
    fn record(&self, record: LogRecord);
}

/// Forwards records to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl SyncSink for TracingSink {
    fn record(&self, record: LogRecord) {
        let path = record.path.as_deref().unwrap_or_default();
        match record.severity {
            Severity::Info => info!(target: "replisync::sync", path, "{}", record.message),
            Severity::Error => error!(target: "replisync::sync", path, "{}", record.message),
        }
    }
}

/// Collects records in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    /// Records in arrival order
    records: Mutex<Vec<LogRecord>>,
}

impl MemorySink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record received so far
    #[must_use]
    pub fn records(&self) -> Vec<LogRecord> {
        self.lock().clone()
    }

    /// Messages of every record, in arrival order
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.lock().iter().map(|r| r.message.clone()).collect()
    }

    /// Error-severity records only
    #[must_use]
    pub fn errors(&self) -> Vec<LogRecord> {
        self.lock()
            .iter()
            .filter(|r| r.severity == Severity::Error)
            .cloned()
            .collect()
    }

    /// Drop all collected records
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogRecord>> {
        // A panic while holding the lock cannot leave the Vec half-written.
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl SyncSink for MemorySink {
    fn record(&self, record: LogRecord) {
        self.lock().push(record);
    }
}
