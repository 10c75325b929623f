use super::Config;
use crate::utils::IgnoreSet;
use anyhow::{Context, Result};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Upper bound on configured hashing workers
const MAX_PARALLEL_THREADS: usize = 1024;

pub fn parse_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config_str(&content)
        .with_context(|| format!("Invalid config file: {}", path.display()))
}

pub fn parse_config_str(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse TOML config")?;

    // Validate and return validation errors directly without wrapping
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &Config) -> Result<()> {
    IgnoreSet::new(&config.sync.ignore_patterns)?;

    if config.performance.parallel_threads > MAX_PARALLEL_THREADS {
        anyhow::bail!("Parallel threads cannot exceed {MAX_PARALLEL_THREADS}");
    }

    for (name, directive) in [
        ("logging.level", &config.logging.level),
        ("logging.file_level", &config.logging.file_level),
    ] {
        EnvFilter::try_new(directive)
            .with_context(|| format!("Invalid {name}: {directive}"))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config_str("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.sync.preserve_permissions);
        assert!(config.sync.preserve_timestamps);
        assert!(!config.sync.prune_empty_dirs);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_sections() {
        let config = parse_config_str(
            r#"
            [sync]
            ignore_patterns = [".git", "*.tmp"]
            prune_empty_dirs = true

            [logging]
            level = "replisync=debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.sync.ignore_patterns, vec![".git", "*.tmp"]);
        assert!(config.sync.prune_empty_dirs);
        assert!(config.sync.preserve_timestamps);
        assert_eq!(config.logging.file_level, "info");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = parse_config_str("[sync]\nfollow_symlinks = true\n").unwrap_err();
        assert!(format!("{err:#}").contains("follow_symlinks"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(parse_config_str("[sync]\nignore_patterns = [\"[oops\"]\n").is_err());
        assert!(parse_config_str("[performance]\nparallel_threads = 5000\n").is_err());
    }
}
