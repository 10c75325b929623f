//! Command-line interface definitions for replisync.
//!
//! The CLI definitions are shared between the main binary and build tools
//! (like xtask) for man page generation.
//!
//! Note: Field-level documentation is provided via clap attributes, so we
//! allow missing_docs for this module to avoid redundant documentation.

#![allow(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

use crate::logging::Verbosity;
use clap::Parser;
use std::num::NonZeroU64;
use std::path::PathBuf;

/// Main CLI structure for replisync.
#[derive(Parser, Debug)]
#[command(
    name = "replisync",
    version = crate::VERSION,
    about = "Keep a replica directory identical to a source directory",
    long_about = "One-way directory mirroring. Every INTERVAL seconds the replica is \
                  compared with the source by content fingerprint, and files are copied \
                  or deleted until both trees hold the same bytes."
)]
pub struct Cli {
    /// Directory to mirror (never modified)
    pub source: PathBuf,

    /// Directory made identical to the source (created if missing)
    pub replica: PathBuf,

    /// Seconds between synchronization passes
    pub interval: NonZeroU64,

    /// File that receives the log (appended to)
    pub log_file: PathBuf,

    /// Configuration file (TOML)
    #[arg(short, long, env = "REPLISYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Run a single pass and exit
    #[arg(long)]
    pub once: bool,

    /// Report what would change without touching the replica
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Number of hashing threads (0 = automatic)
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,

    /// Glob pattern to skip in both trees (repeatable)
    #[arg(long = "ignore", value_name = "PATTERN")]
    pub ignore: Vec<String>,

    /// Remove replica directories left empty after deletes
    #[arg(long)]
    pub prune_empty_dirs: bool,

    /// Show verbose output
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress informational messages on the console
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Console verbosity implied by the flags
    #[must_use]
    pub const fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else if self.verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_positional_arguments() {
        let cli = Cli::try_parse_from(["replisync", "src", "dst", "30", "sync.log"]).unwrap();
        assert_eq!(cli.source, PathBuf::from("src"));
        assert_eq!(cli.replica, PathBuf::from("dst"));
        assert_eq!(cli.interval.get(), 30);
        assert_eq!(cli.log_file, PathBuf::from("sync.log"));
        assert_eq!(cli.verbosity(), Verbosity::Normal);
    }

    #[test]
    fn test_interval_must_be_positive() {
        assert!(Cli::try_parse_from(["replisync", "a", "b", "0", "log"]).is_err());
        assert!(Cli::try_parse_from(["replisync", "a", "b", "-5", "log"]).is_err());
        assert!(Cli::try_parse_from(["replisync", "a", "b", "soon", "log"]).is_err());
    }

    #[test]
    fn test_repeatable_ignore() {
        let cli = Cli::try_parse_from([
            "replisync", "a", "b", "1", "log", "--ignore", ".git", "--ignore", "*.tmp", "-q",
        ])
        .unwrap();
        assert_eq!(cli.ignore, vec![".git", "*.tmp"]);
        assert_eq!(cli.verbosity(), Verbosity::Quiet);
    }
}
