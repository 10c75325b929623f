//! One reconciliation pass: snapshot both trees, diff, apply.
//!
//! The phases never interleave. Both snapshots are complete before the plan
//! is computed, and the plan is complete before anything in the replica is
//! touched. Failures are recorded per path and never abort the pass.

use crate::apply::{ApplyOptions, copy_file, delete_file};
use crate::config::Config;
use crate::error::SyncError;
use crate::plan::{ActionKind, SyncAction, SyncPlan};
use crate::sink::{LogRecord, SyncSink};
use crate::snapshot::{ContentHasher, FileHasher, TreeScan, TreeScanner, TreeSnapshot};
use crate::utils::IgnoreSet;
use crate::utils::paths::resolve_key;
use crate::utils::thread_pool;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Level, debug, span};

/// Knobs for a reconciliation pass
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Paths skipped in both trees
    pub ignore: IgnoreSet,
    /// Copy/delete behaviour
    pub apply: ApplyOptions,
    /// Hashing workers; 0 selects the shared default pool
    pub threads: usize,
    /// Report the plan without touching the replica
    pub dry_run: bool,
}

impl SyncOptions {
    /// Build options from a loaded configuration
    ///
    /// # Errors
    ///
    /// Returns an error if an ignore pattern is not a valid glob
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            ignore: IgnoreSet::new(&config.sync.ignore_patterns)?,
            apply: ApplyOptions {
                preserve_permissions: config.sync.preserve_permissions,
                preserve_timestamps: config.sync.preserve_timestamps,
                prune_empty_dirs: config.sync.prune_empty_dirs,
            },
            threads: config.performance.parallel_threads,
            dry_run: false,
        })
    }
}

/// Outcome of one pass
#[derive(Debug)]
pub struct PassReport {
    /// Actions that were carried out, in the order they ran
    pub applied: Vec<SyncAction>,
    /// Actions that were decided but not carried out (dry-run mode)
    pub pending: Vec<SyncAction>,
    /// Paths left alone because one side could not be verified
    pub held_back: Vec<String>,
    /// Every per-path failure, in the order it was reported
    pub errors: Vec<SyncError>,
    /// Regular files seen in the source
    pub source_files: usize,
    /// Regular files seen in the replica before applying
    pub replica_files: usize,
    /// Symlinks and special files passed over in either tree
    pub skipped: usize,
    /// When the pass started
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration of the pass
    pub elapsed: Duration,
}

impl PassReport {
    /// Number of actions carried out
    #[must_use]
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    /// Per-path failures
    #[must_use]
    pub fn errors(&self) -> &[SyncError] {
        &self.errors
    }

    /// Whether the pass finished without any failure
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Paths copied in this pass
    pub fn copied(&self) -> impl Iterator<Item = &str> {
        self.applied_of(ActionKind::Copy)
    }

    /// Paths deleted in this pass
    pub fn deleted(&self) -> impl Iterator<Item = &str> {
        self.applied_of(ActionKind::Delete)
    }

    fn applied_of(&self, kind: ActionKind) -> impl Iterator<Item = &str> {
        self.applied
            .iter()
            .filter(move |action| action.kind() == kind)
            .map(SyncAction::path)
    }
}

/// Runs reconciliation passes with fixed options
pub struct Reconciler {
    /// Options applied to every pass
    options: SyncOptions,
    /// Pool used for fingerprinting
    pool: Arc<rayon::ThreadPool>,
    /// Fingerprint source for both trees
    hasher: Arc<dyn FileHasher>,
}

impl Reconciler {
    /// Create a reconciler
    ///
    /// # Errors
    ///
    /// Returns an error if the hashing pool cannot be created
    pub fn new(options: SyncOptions) -> Result<Self> {
        let pool = thread_pool::pool_for(options.threads)?;
        Ok(Self {
            options,
            pool,
            hasher: Arc::new(ContentHasher),
        })
    }

    /// Fingerprint files through `hasher` instead of reading them directly
    #[must_use]
    pub fn with_hasher(mut self, hasher: Arc<dyn FileHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Options in effect
    #[must_use]
    pub const fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Make `replica` match `source`, reporting to `sink`
    ///
    /// Side effects are confined to the replica tree and the sink; the source
    /// is only read.
    pub fn reconcile(&self, source: &Path, replica: &Path, sink: &dyn SyncSink) -> PassReport {
        let span = span!(
            Level::INFO,
            "reconcile",
            source = %source.display(),
            replica = %replica.display()
        );
        let _guard = span.enter();

        let started_at = Utc::now();
        let start = Instant::now();
        let mut errors = Vec::new();
        let mut skipped = 0;

        let scanner = TreeScanner::new(&self.options.ignore, &self.pool)
            .with_hasher(self.hasher.as_ref());
        let source_snapshot =
            Self::collect(scanner.scan(source), sink, &mut errors, &mut skipped);
        let replica_snapshot = if replica_is_absent(replica) {
            TreeSnapshot::default()
        } else {
            Self::collect(scanner.scan(replica), sink, &mut errors, &mut skipped)
        };

        let plan = SyncPlan::between(&source_snapshot, &replica_snapshot);
        for path in &plan.held_back {
            debug!(path = %path, "Holding back unverified path");
        }

        let mut report = PassReport {
            applied: Vec::with_capacity(plan.len()),
            pending: Vec::new(),
            held_back: plan.held_back.clone(),
            errors: Vec::new(),
            source_files: source_snapshot.len(),
            replica_files: replica_snapshot.len(),
            skipped,
            started_at,
            elapsed: Duration::ZERO,
        };

        if self.options.dry_run {
            for action in plan.actions() {
                sink.record(LogRecord::planned(&action));
                report.pending.push(action);
            }
        } else {
            for action in plan.actions() {
                match self.apply(&action, source, replica) {
                    Ok(()) => {
                        sink.record(LogRecord::applied(&action));
                        report.applied.push(action);
                    }
                    Err(e) => {
                        let error = SyncError::Apply {
                            action: action.kind(),
                            path: action.path().to_string(),
                            source: e,
                        };
                        sink.record(LogRecord::failed(&error));
                        errors.push(error);
                    }
                }
            }
        }

        report.errors = errors;
        report.elapsed = start.elapsed();
        debug!(
            applied = report.applied.len(),
            errors = report.errors.len(),
            skipped = report.skipped,
            elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
            "Pass finished"
        );
        report
    }

    /// Carry out one action against the filesystem
    fn apply(&self, action: &SyncAction, source: &Path, replica: &Path) -> io::Result<()> {
        let target = resolve_key(replica, action.path());
        match action {
            SyncAction::Copy(path) => copy_file(
                &resolve_key(source, path),
                &target,
                replica,
                self.options.apply,
            ),
            SyncAction::Delete(_) => delete_file(&target, replica, self.options.apply),
        }
    }

    /// Report a scan's errors and keep its snapshot
    fn collect(
        scan: TreeScan,
        sink: &dyn SyncSink,
        errors: &mut Vec<SyncError>,
        skipped: &mut usize,
    ) -> TreeSnapshot {
        *skipped += scan.skipped.len();
        for error in scan.errors {
            sink.record(LogRecord::failed(&error));
            errors.push(error);
        }
        scan.snapshot
    }
}

/// A replica root that does not exist yet is simply empty
fn replica_is_absent(replica: &Path) -> bool {
    matches!(
        replica.symlink_metadata(),
        Err(ref e) if e.kind() == io::ErrorKind::NotFound
    )
}

/// Run one pass with default options
///
/// # Errors
///
/// Returns an error if the default hashing pool cannot be created
pub fn reconcile(source: &Path, replica: &Path, sink: &dyn SyncSink) -> Result<PassReport> {
    Ok(Reconciler::new(SyncOptions::default())?.reconcile(source, replica, sink))
}
