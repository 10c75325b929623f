//! Per-path errors recorded during a reconciliation pass.
//!
//! None of these abort a pass. Each one is attached to the relative path it
//! concerns, reported to the sink, and returned in the pass report.

use crate::plan::ActionKind;
use std::fmt;
use std::io;

/// Categorized failure for a single path within one pass
#[derive(Debug)]
pub enum SyncError {
    /// A directory or file could not be listed or stat'd during the walk
    Enumeration {
        /// Relative path of the entry (empty for the tree root)
        path: String,
        /// Underlying I/O failure
        source: io::Error,
    },
    /// A file could not be fully read to compute its digest
    Fingerprint {
        /// Relative path of the file
        path: String,
        /// Underlying I/O failure
        source: io::Error,
    },
    /// A decided copy or delete failed while being applied
    Apply {
        /// Which action failed
        action: ActionKind,
        /// Relative path the action targeted
        path: String,
        /// Underlying I/O failure
        source: io::Error,
    },
}

impl SyncError {
    /// Relative path the error concerns (empty for a tree root)
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Enumeration { path, .. }
            | Self::Fingerprint { path, .. }
            | Self::Apply { path, .. } => path,
        }
    }

    /// Underlying I/O error kind
    #[must_use]
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            Self::Enumeration { source, .. }
            | Self::Fingerprint { source, .. }
            | Self::Apply { source, .. } => source.kind(),
        }
    }

    /// Whether the condition is likely to clear up by the next tick
    ///
    /// Files vanishing between snapshot and apply, interrupted reads and
    /// timeouts are transient. Permission and space problems usually need
    /// someone to intervene, although the next tick will retry them anyway.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind(),
            io::ErrorKind::NotFound
                | io::ErrorKind::Interrupted
                | io::ErrorKind::TimedOut
                | io::ErrorKind::WouldBlock
        )
    }
}

/// Render a relative path for messages, using `.` for the root
fn display_path(path: &str) -> &str {
    if path.is_empty() { "." } else { path }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enumeration { path, source } => {
                write!(f, "Failed to enumerate '{}': {source}", display_path(path))
            }
            Self::Fingerprint { path, source } => {
                write!(f, "Failed to fingerprint '{}': {source}", display_path(path))
            }
            Self::Apply {
                action,
                path,
                source,
            } => write!(
                f,
                "Failed to {} '{}': {source}",
                action.as_str(),
                display_path(path)
            ),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Enumeration { source, .. }
            | Self::Fingerprint { source, .. }
            | Self::Apply { source, .. } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_path_and_cause() {
        let error = SyncError::Apply {
            action: ActionKind::Copy,
            path: "docs/a.txt".to_string(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
        };
        assert_eq!(
            error.to_string(),
            "Failed to copy 'docs/a.txt': permission denied"
        );
        assert_eq!(error.path(), "docs/a.txt");
        assert!(!error.is_transient());
    }

    #[test]
    fn test_root_renders_as_dot() {
        let error = SyncError::Enumeration {
            path: String::new(),
            source: io::Error::new(io::ErrorKind::NotFound, "gone"),
        };
        assert_eq!(error.to_string(), "Failed to enumerate '.': gone");
        assert!(error.is_transient());
    }
}
