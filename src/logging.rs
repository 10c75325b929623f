//! Process-wide `tracing` subscriber: console on stderr plus an append-only log file.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

/// Console verbosity selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Warnings and errors only
    Quiet,
    /// Level from configuration (or `RUST_LOG`)
    Normal,
    /// Debug output from this crate
    Verbose,
}

/// Console and file filter directives
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Console filter directive
    pub console_level: String,
    /// File filter directive
    pub file_level: String,
    /// Command-line verbosity override
    pub verbosity: Verbosity,
}

impl LogSettings {
    /// Console filter: verbosity flags win, then `RUST_LOG`, then configuration
    fn console_filter(&self) -> Result<EnvFilter> {
        let filter = match self.verbosity {
            Verbosity::Quiet => EnvFilter::try_new("warn")?,
            Verbosity::Verbose => EnvFilter::try_new("info,replisync=debug")?,
            Verbosity::Normal => EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&self.console_level))?,
        };
        Ok(filter)
    }
}

/// Install the global subscriber
///
/// # Errors
///
/// Returns an error if the log file cannot be opened, a filter directive is
/// invalid, or a global subscriber is already installed.
pub fn init(log_file: &Path, settings: &LogSettings) -> Result<()> {
    if let Some(parent) = log_file.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create log directory: {}", parent.display())
        })?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("Failed to open log file: {}", log_file.display()))?;

    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .with_filter(
            EnvFilter::try_new(&settings.file_level)
                .with_context(|| format!("Invalid file log level: {}", settings.file_level))?,
        );

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(settings.console_filter()?);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_overrides_config() {
        let settings = LogSettings {
            console_level: "not a directive ===".to_string(),
            file_level: "info".to_string(),
            verbosity: Verbosity::Quiet,
        };
        assert!(settings.console_filter().is_ok());
    }
}
