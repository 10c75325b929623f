//! Utility functions and helpers.
//!
//! # Submodules
//!
//! - [`paths`]: Relative path keys and directory helpers
//! - [`permissions`]: Cross-platform file permissions
//! - [`thread_pool`]: Worker pools for parallel hashing
//!
//! Ignore-pattern matching lives here as [`IgnoreSet`].

/// Path manipulation and relative key utilities
pub mod paths;
/// Unix permission handling
pub mod permissions;
/// Thread pool configuration for parallel operations
pub mod thread_pool;

use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};

/// Compiled set of glob patterns matched against relative path keys.
///
/// A pattern containing `/` must match the whole key. A pattern without `/`
/// matches if it matches any single component, so `.git` skips every `.git`
/// directory and `*.tmp` skips temp files at any depth.
#[derive(Debug, Clone, Default)]
pub struct IgnoreSet {
    /// Compiled patterns, paired with whether they are anchored to the full key
    patterns: Vec<(Pattern, bool)>,
}

impl IgnoreSet {
    /// Compile a list of glob patterns
    ///
    /// # Errors
    ///
    /// Returns an error naming the first pattern that is not a valid glob
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|raw| {
                let raw = raw.as_ref().trim_end_matches('/');
                Pattern::new(raw)
                    .map(|pattern| (pattern, raw.contains('/')))
                    .with_context(|| format!("Invalid ignore pattern: {raw}"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Returns true when no patterns are configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Check whether a relative key should be skipped
    #[must_use]
    pub fn is_ignored(&self, key: &str) -> bool {
        const OPTIONS: MatchOptions = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };

        self.patterns.iter().any(|(pattern, anchored)| {
            if *anchored {
                pattern.matches_with(key, OPTIONS)
            } else {
                key.split(paths::KEY_SEPARATOR)
                    .any(|component| pattern.matches_with(component, OPTIONS))
            }
        })
    }
}
