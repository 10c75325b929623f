//! Tree snapshots: one full walk + fingerprint table per root.
//!
//! The walk is sequential (`walkdir`, sorted by file name); fingerprinting of
//! the collected regular files fans out over a rayon pool. Nothing here is
//! cached between passes.

use crate::error::SyncError;
use crate::fingerprint::{Digest, fingerprint_file};
use crate::utils::IgnoreSet;
use crate::utils::paths::{KEY_SEPARATOR, lossy_key, relative_key};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{Level, debug, span};
use walkdir::WalkDir;

/// A regular file's relative path and content fingerprint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Slash-separated path relative to the tree root
    pub path: String,
    /// Content fingerprint
    pub digest: Digest,
}

/// Relative path -> entry table for one tree, plus the paths that could not be verified
#[derive(Debug, Clone, Default)]
pub struct TreeSnapshot {
    /// One entry per regular file
    entries: BTreeMap<String, FileEntry>,
    /// Files or directory prefixes whose state is unknown for this pass
    unverified: BTreeSet<String>,
}

impl TreeSnapshot {
    /// Number of regular files recorded
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no files were recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up an entry by relative path
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&FileEntry> {
        self.entries.get(path)
    }

    /// Whether a regular file exists at the relative path
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Entries in lexicographic path order
    pub fn entries(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.values()
    }

    /// Relative paths in lexicographic order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Whether `path` (or a directory containing it) could not be verified
    ///
    /// Looks up `path` and each of its ancestors, so the cost depends on the
    /// path's depth rather than on how many entries are unverified.
    #[must_use]
    pub fn is_unverified(&self, path: &str) -> bool {
        if self.unverified.is_empty() {
            return false;
        }
        self.unverified.contains("")
            || self.unverified.contains(path)
            || path
                .match_indices(KEY_SEPARATOR)
                .any(|(end, _)| self.unverified.contains(&path[..end]))
    }

    fn insert(&mut self, entry: FileEntry) {
        self.entries.insert(entry.path.clone(), entry);
    }

    fn mark_unverified(&mut self, path: String) {
        self.unverified.insert(path);
    }
}

/// Result of scanning one tree
#[derive(Debug, Default)]
pub struct TreeScan {
    /// Everything that was walked and fingerprinted successfully
    pub snapshot: TreeSnapshot,
    /// Per-path enumeration and fingerprint failures
    pub errors: Vec<SyncError>,
    /// Symlinks and special files that were passed over
    pub skipped: Vec<String>,
}

/// Produces the fingerprint of one regular file found by the walk
pub trait FileHasher: Send + Sync {
    /// Fingerprint the file at `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be fully read.
    fn fingerprint(&self, path: &Path) -> io::Result<Digest>;
}

/// Streams the file's bytes from disk
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHasher;

impl FileHasher for ContentHasher {
    fn fingerprint(&self, path: &Path) -> io::Result<Digest> {
        fingerprint_file(path)
    }
}

/// Walks a root and builds its snapshot
pub struct TreeScanner<'a> {
    /// Patterns excluded from the walk
    ignore: &'a IgnoreSet,
    /// Pool used to fingerprint collected files
    pool: &'a rayon::ThreadPool,
    /// How each collected file is fingerprinted
    hasher: &'a dyn FileHasher,
}

impl<'a> TreeScanner<'a> {
    /// Create a scanner that reads file contents from disk
    #[must_use]
    pub fn new(ignore: &'a IgnoreSet, pool: &'a rayon::ThreadPool) -> Self {
        Self {
            ignore,
            pool,
            hasher: &ContentHasher,
        }
    }

    /// Use a different fingerprint source
    #[must_use]
    pub fn with_hasher(mut self, hasher: &'a dyn FileHasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// Walk `root`, fingerprint every regular file, and collect per-path failures
    ///
    /// A root that is missing or not a directory yields an empty snapshot in
    /// which everything is unverified, plus one enumeration error.
    pub fn scan(&self, root: &Path) -> TreeScan {
        let span = span!(Level::DEBUG, "scan_tree", root = %root.display());
        let _guard = span.enter();

        let mut scan = TreeScan::default();

        match root.metadata() {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => {
                scan.fail_enumeration(
                    String::new(),
                    io::Error::new(io::ErrorKind::NotADirectory, "root is not a directory"),
                );
                return scan;
            }
            Err(e) => {
                scan.fail_enumeration(String::new(), e);
                return scan;
            }
        }

        let candidates = self.walk(root, &mut scan);
        self.fingerprint(candidates, &mut scan);

        debug!(
            files = scan.snapshot.len(),
            errors = scan.errors.len(),
            skipped = scan.skipped.len(),
            "Tree scanned"
        );
        scan
    }

    /// Sequential walk collecting `(key, absolute path)` for every regular file
    fn walk(&self, root: &Path, scan: &mut TreeScan) -> Vec<(String, PathBuf)> {
        let mut candidates = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || relative_key(root, entry.path())
                        .map_or(true, |key| !self.ignore.is_ignored(&key))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    // The failing entry may be a directory: its whole subtree is unknown.
                    let key = e
                        .path()
                        .and_then(|path| relative_key(root, path).ok())
                        .unwrap_or_default();
                    scan.fail_enumeration(key, io::Error::from(e));
                    continue;
                }
            };

            if entry.depth() == 0 {
                continue;
            }

            let file_type = entry.file_type();
            if file_type.is_dir() {
                continue;
            }

            let key = match relative_key(root, entry.path()) {
                Ok(key) => key,
                Err(e) => {
                    scan.errors.push(SyncError::Enumeration {
                        path: lossy_key(root, entry.path()),
                        source: e,
                    });
                    continue;
                }
            };

            if file_type.is_symlink() {
                debug!(path = %key, "Skipping symbolic link");
                scan.skipped.push(key);
            } else if file_type.is_file() {
                candidates.push((key, entry.into_path()));
            } else {
                debug!(path = %key, "Skipping special file");
                scan.skipped.push(key);
            }
        }

        candidates
    }

    /// Parallel fingerprinting of the collected files
    fn fingerprint(&self, candidates: Vec<(String, PathBuf)>, scan: &mut TreeScan) {
        let hasher = self.hasher;
        let results: Vec<(String, io::Result<Digest>)> = self.pool.install(|| {
            candidates
                .into_par_iter()
                .map(|(key, path)| {
                    let digest = hasher.fingerprint(&path);
                    (key, digest)
                })
                .collect()
        });

        for (key, result) in results {
            match result {
                Ok(digest) => scan.snapshot.insert(FileEntry { path: key, digest }),
                Err(e) => {
                    scan.snapshot.mark_unverified(key.clone());
                    scan.errors.push(SyncError::Fingerprint {
                        path: key,
                        source: e,
                    });
                }
            }
        }
    }
}

impl TreeScan {
    fn fail_enumeration(&mut self, key: String, source: io::Error) {
        self.snapshot.mark_unverified(key.clone());
        self.errors.push(SyncError::Enumeration { path: key, source });
    }
}
