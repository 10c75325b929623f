//! Diffing two snapshots into a copy/delete plan.

use crate::snapshot::TreeSnapshot;
use crate::utils::paths::{KEY_SEPARATOR, key_is_within};
use std::collections::BTreeSet;
use std::fmt;
use std::ops::Bound;

/// Kind of change applied to the replica
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Write the source file's bytes over the replica path
    Copy,
    /// Remove the replica path
    Delete,
}

impl ActionKind {
    /// Lowercase verb, as used in messages
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single decided change, keyed by relative path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SyncAction {
    /// Copy `source/path` to `replica/path`
    Copy(String),
    /// Remove `replica/path`
    Delete(String),
}

impl SyncAction {
    /// The action's kind
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::Copy(_) => ActionKind::Copy,
            Self::Delete(_) => ActionKind::Delete,
        }
    }

    /// Relative path the action targets
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Copy(path) | Self::Delete(path) => path,
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.path())
    }
}

/// Copies and deletes needed to make the replica match the source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// Paths to copy, in lexicographic order
    pub copies: Vec<String>,
    /// Paths to delete, in lexicographic order
    pub deletes: Vec<String>,
    /// Paths that differ but were left alone because one side is unverified
    pub held_back: Vec<String>,
}

impl SyncPlan {
    /// Diff two snapshots
    ///
    /// A source path is copied when the replica lacks it or holds different
    /// bytes. A replica path is deleted when the source lacks it. Any path
    /// that is unverified in either snapshot is held back instead, so a file
    /// that could not be read is never overwritten or removed on a guess.
    #[must_use]
    pub fn between(source: &TreeSnapshot, replica: &TreeSnapshot) -> Self {
        let mut plan = Self::default();

        for entry in source.entries() {
            let needs_copy = replica
                .get(&entry.path)
                .is_none_or(|existing| existing.digest != entry.digest);
            if !needs_copy {
                continue;
            }
            if replica.is_unverified(&entry.path) || source.is_unverified(&entry.path) {
                plan.held_back.push(entry.path.clone());
            } else {
                plan.copies.push(entry.path.clone());
            }
        }

        for path in replica.paths() {
            if source.contains(path) {
                continue;
            }
            if source.is_unverified(path) || replica.is_unverified(path) {
                plan.held_back.push(path.to_string());
            } else {
                plan.deletes.push(path.to_string());
            }
        }

        plan
    }

    /// All actions in application order
    ///
    /// Copies come first and deletes last, each in lexicographic order, except
    /// that a delete standing in a copy's way runs right before that copy: a
    /// replica file where the copy needs a parent directory, or replica files
    /// below a path the source now holds as a file.
    pub fn actions(&self) -> impl Iterator<Item = SyncAction> {
        let mut pending: BTreeSet<&str> = self.deletes.iter().map(String::as_str).collect();
        let mut ordered = Vec::with_capacity(self.len());

        for copy in &self.copies {
            for blocking in blocking_deletes(&pending, copy) {
                pending.remove(blocking);
                ordered.push(SyncAction::Delete(blocking.to_string()));
            }
            ordered.push(SyncAction::Copy(copy.clone()));
        }

        ordered.extend(
            self.deletes
                .iter()
                .filter(|path| pending.contains(path.as_str()))
                .cloned()
                .map(SyncAction::Delete),
        );
        ordered.into_iter()
    }

    /// Number of actions in the plan
    #[must_use]
    pub fn len(&self) -> usize {
        self.copies.len() + self.deletes.len()
    }

    /// Whether the trees already match
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.copies.is_empty() && self.deletes.is_empty()
    }
}

/// Pending deletes at an ancestor of `copy` or anywhere below it, in order
fn blocking_deletes<'a>(pending: &BTreeSet<&'a str>, copy: &str) -> Vec<&'a str> {
    let mut blocking: Vec<&'a str> = copy
        .match_indices(KEY_SEPARATOR)
        .filter_map(|(end, _)| pending.get(&copy[..end]).copied())
        .collect();

    let below = format!("{copy}{KEY_SEPARATOR}");
    blocking.extend(
        pending
            .range::<str, _>((Bound::Excluded(below.as_str()), Bound::Unbounded))
            .take_while(|path| key_is_within(path, copy))
            .copied(),
    );
    blocking
}
