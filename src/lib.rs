#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]
// Allow pedantic strict lints that create false positives in this codebase
#![allow(clippy::arithmetic_side_effects)] // Simple counters cannot overflow
#![allow(clippy::indexing_slicing)] // Bounds checked by logic

//! # Replisync - One-Way Directory Mirroring
//!
//! Replisync keeps a replica directory byte-for-byte identical to a source
//! directory. Each pass fingerprints every regular file in both trees, diffs
//! the two tables, and applies the minimal set of copies and deletes. Change
//! detection is purely content based: timestamps and sizes are never trusted.
//!
//! ## Features
//!
//! - **Content Fingerprints**: Files are hashed with streaming xxHash3-128
//! - **Parallel Hashing**: Uses Rayon to fingerprint files across cores
//! - **Atomic Copies**: Files land via temp file + rename, never half-written
//! - **Per-Path Failure Isolation**: One unreadable file never stops a pass
//! - **Stateless Passes**: Nothing is cached between ticks
//!
//! ## Architecture
//!
//! - [`fingerprint`]: Streaming content digests
//! - [`snapshot`]: Tree walks producing path -> digest tables
//! - [`plan`]: Diffing two snapshots into copy/delete actions
//! - [`apply`]: Filesystem primitives for copy and delete
//! - [`reconcile`]: One full pass and its report
//! - [`scheduler`]: Interval loop driving passes
//! - [`sink`]: Where per-action records go
//!
//! ## Example Usage
//!
//! ```no_run
//! use replisync::reconcile::{Reconciler, SyncOptions};
//! use replisync::sink::MemorySink;
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let reconciler = Reconciler::new(SyncOptions::default())?;
//! let sink = MemorySink::new();
//!
//! let report = reconciler.reconcile(Path::new("/data/source"), Path::new("/data/replica"), &sink);
//! println!("{} actions, {} errors", report.applied_count(), report.errors().len());
//! # Ok(())
//! # }
//! ```

/// Filesystem primitives that carry out copy and delete actions.
pub mod apply;

/// Command-line interface definitions (argument parsing structures).
pub mod cli;

/// Configuration parsing and validation.
pub mod config;

/// Per-path error taxonomy.
pub mod error;

/// Content fingerprinting.
pub mod fingerprint;

/// Replica locking to prevent overlapping passes.
pub mod lock;

/// Log subscriber setup for the binary.
pub mod logging;

/// Snapshot diffing.
pub mod plan;

/// Single reconciliation pass.
pub mod reconcile;

/// Interval driver.
pub mod scheduler;

/// Logging sink interface consumed by the reconciler.
pub mod sink;

/// Tree walking and fingerprint tables.
pub mod snapshot;

/// Utility functions and helpers.
pub mod utils;

pub use error::SyncError;
pub use fingerprint::Digest;
pub use plan::{ActionKind, SyncAction, SyncPlan};
pub use reconcile::{PassReport, Reconciler, SyncOptions, reconcile};
pub use sink::{LogRecord, MemorySink, Severity, SyncSink, TracingSink};
pub use snapshot::{FileEntry, TreeSnapshot};

/// Current version of the replisync binary.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration file path relative to home directory.
pub const DEFAULT_CONFIG_PATH: &str = ".config/replisync/config.toml";
