//! Interval driver: one reconciliation pass per tick.
//!
//! Passes never overlap. A tick starts when the previous pass has finished
//! and at least `interval` has elapsed since the previous tick started. Pass
//! errors are logged and retried naturally on the next tick.

use crate::lock::{DEFAULT_LOCK_TIMEOUT, ReplicaLock};
use crate::reconcile::{PassReport, Reconciler};
use crate::sink::SyncSink;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Counters accumulated over a bounded run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Ticks executed
    pub ticks: u64,
    /// Actions applied across all passes
    pub applied: usize,
    /// Per-path errors across all passes
    pub errors: usize,
    /// Ticks where no pass ran at all (lock contention)
    pub skipped_ticks: u64,
}

/// Drives a reconciler against one source/replica pair
pub struct Scheduler {
    /// Tree that is mirrored
    source: PathBuf,
    /// Tree that is made to match
    replica: PathBuf,
    /// Minimum time between tick starts
    interval: Duration,
    /// Pass implementation
    reconciler: Reconciler,
    /// Where replica lock files live
    lock_dir: PathBuf,
    /// How long to wait for a competing pass
    lock_timeout: Duration,
}

impl Scheduler {
    /// Create a scheduler using the default lock directory
    #[must_use]
    pub fn new(
        source: impl Into<PathBuf>,
        replica: impl Into<PathBuf>,
        interval: Duration,
        reconciler: Reconciler,
    ) -> Self {
        Self {
            source: source.into(),
            replica: replica.into(),
            interval,
            reconciler,
            lock_dir: ReplicaLock::default_dir(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Use a different directory for lock files
    #[must_use]
    pub fn with_lock_dir(mut self, lock_dir: impl Into<PathBuf>) -> Self {
        self.lock_dir = lock_dir.into();
        self
    }

    /// Change how long a tick waits for a competing pass
    #[must_use]
    pub const fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Source root
    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Replica root
    #[must_use]
    pub fn replica(&self) -> &Path {
        &self.replica
    }

    /// Run exactly one pass under the replica lock
    ///
    /// # Errors
    ///
    /// Returns an error only if the lock cannot be acquired; per-path failures
    /// are part of the report.
    pub fn run_once(&self, sink: &dyn SyncSink) -> Result<PassReport> {
        let _lock = ReplicaLock::acquire(&self.lock_dir, &self.replica, self.lock_timeout)?;
        Ok(self.reconciler.reconcile(&self.source, &self.replica, sink))
    }

    /// Run passes every interval, `max_ticks` times or forever
    pub fn run(&self, sink: &dyn SyncSink, max_ticks: Option<u64>) -> RunSummary {
        info!(
            source = %self.source.display(),
            replica = %self.replica.display(),
            interval = %humantime::format_duration(self.interval),
            "Starting sync loop"
        );

        let mut summary = RunSummary::default();
        while max_ticks.is_none_or(|max| summary.ticks < max) {
            let tick_start = Instant::now();
            summary.ticks += 1;

            match self.run_once(sink) {
                Ok(report) => {
                    log_pass(summary.ticks, &report);
                    summary.applied += report.applied_count();
                    summary.errors += report.errors().len();
                }
                Err(e) => {
                    error!(tick = summary.ticks, "Skipping tick: {e:#}");
                    summary.skipped_ticks += 1;
                }
            }

            if max_ticks.is_some_and(|max| summary.ticks >= max) {
                break;
            }

            let elapsed = tick_start.elapsed();
            if elapsed >= self.interval {
                warn!(
                    elapsed = %humantime::format_duration(truncate_to_millis(elapsed)),
                    "Pass took longer than the sync interval"
                );
            } else {
                std::thread::sleep(self.interval - elapsed);
            }
        }
        summary
    }
}

/// One summary line per pass
fn log_pass(tick: u64, report: &PassReport) {
    let elapsed = humantime::format_duration(truncate_to_millis(report.elapsed));
    if report.is_clean() {
        info!(
            tick,
            copied = report.copied().count(),
            deleted = report.deleted().count(),
            pending = report.pending.len(),
            skipped = report.skipped,
            files = report.source_files,
            %elapsed,
            "Pass complete"
        );
    } else {
        warn!(
            tick,
            copied = report.copied().count(),
            deleted = report.deleted().count(),
            errors = report.errors().len(),
            transient = report.errors().iter().filter(|e| e.is_transient()).count(),
            skipped = report.skipped,
            files = report.source_files,
            %elapsed,
            "Pass complete with errors"
        );
    }
}

fn truncate_to_millis(duration: Duration) -> Duration {
    Duration::from_millis(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}
