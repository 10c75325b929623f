use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use replisync::cli::Cli;
use replisync::config::Config;
use replisync::logging::{self, LogSettings};
use replisync::reconcile::{Reconciler, SyncOptions};
use replisync::scheduler::Scheduler;
use replisync::sink::TracingSink;
use replisync::utils::paths::{make_absolute, trees_overlap};
use std::path::Path;
use std::process;
use std::time::Duration;

fn main() {
    match run() {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();

    let mut config = Config::load_or_default(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli);

    let source = make_absolute(&cli.source)?;
    let replica = make_absolute(&cli.replica)?;
    validate_roots(&source, &replica, !cli.dry_run)?;

    logging::init(
        &cli.log_file,
        &LogSettings {
            console_level: config.logging.level.clone(),
            file_level: config.logging.file_level.clone(),
            verbosity: cli.verbosity(),
        },
    )?;

    let mut options = SyncOptions::from_config(&config)?;
    options.dry_run = cli.dry_run;
    let reconciler = Reconciler::new(options)?;
    let scheduler = Scheduler::new(
        source,
        replica,
        Duration::from_secs(cli.interval.get()),
        reconciler,
    );

    if cli.once {
        let summary = scheduler.run(&TracingSink, Some(1));
        return Ok(if summary.errors == 0 && summary.skipped_ticks == 0 {
            0
        } else {
            1
        });
    }

    scheduler.run(&TracingSink, None);
    Ok(0)
}

/// Command-line flags take precedence over the configuration file
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(threads) = cli.threads {
        config.performance.parallel_threads = threads;
    }
    config.sync.ignore_patterns.extend(cli.ignore.iter().cloned());
    if cli.prune_empty_dirs {
        config.sync.prune_empty_dirs = true;
    }
}

/// Startup checks that make the whole run pointless if they fail
fn validate_roots(source: &Path, replica: &Path, create_replica: bool) -> Result<()> {
    let metadata = source
        .metadata()
        .with_context(|| format!("Source directory not found: {}", source.display()))?;
    if !metadata.is_dir() {
        bail!("Source is not a directory: {}", source.display());
    }

    if trees_overlap(source, replica)? {
        bail!(
            "Source and replica must not overlap: {} and {}",
            source.display(),
            replica.display()
        );
    }

    match replica.metadata() {
        Ok(metadata) if !metadata.is_dir() => {
            bail!("Replica is not a directory: {}", replica.display())
        }
        Ok(_) => {}
        Err(_) if !create_replica => {}
        Err(_) => std::fs::create_dir_all(replica).with_context(|| {
            format!("Failed to create replica directory: {}", replica.display())
        })?,
    }

    Ok(())
}
