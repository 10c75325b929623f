pub mod parser;

use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub performance: PerformanceConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Glob patterns skipped in both trees
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    #[serde(default = "default_true")]
    pub preserve_permissions: bool,
    #[serde(default = "default_true")]
    pub preserve_timestamps: bool,
    /// Remove replica directories emptied by deletes
    #[serde(default)]
    pub prune_empty_dirs: bool,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PerformanceConfig {
    /// Hashing workers; 0 picks min(cpus, 8)
    #[serde(default)]
    pub parallel_threads: usize,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Console filter directive (`RUST_LOG` takes precedence)
    #[serde(default = "default_level")]
    pub level: String,
    /// Log file filter directive
    #[serde(default = "default_level")]
    pub file_level: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ignore_patterns: Vec::new(),
            preserve_permissions: true,
            preserve_timestamps: true,
            prune_empty_dirs: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_level: default_level(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The file contains invalid TOML or unknown fields
    /// - A value fails validation
    pub fn load(path: &Path) -> Result<Self> {
        parser::parse_config_file(path)
    }

    /// Load the explicitly requested file, or the default file if it exists
    ///
    /// Falls back to built-in defaults when no path is given and the default
    /// file is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen file cannot be loaded
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

/// `~/.config/replisync/config.toml`, if a home directory is known
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(crate::DEFAULT_CONFIG_PATH))
}

// Default functions for serde
const fn default_true() -> bool {
    true
}

fn default_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            "[sync]\nignore_patterns = [\".git\", \"*.swp\"]\n\n[performance]\nparallel_threads = 4\n",
        )
        .unwrap();

        let mut expected = Config::default();
        expected.sync.ignore_patterns = vec![".git".to_string(), "*.swp".to_string()];
        expected.performance.parallel_threads = 4;
        assert_eq!(Config::load(&path).unwrap(), expected);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("absent.toml");
        assert!(Config::load_or_default(Some(&missing)).is_err());
    }
}
