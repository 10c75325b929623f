#![allow(dead_code)]

use anyhow::Result;
use replisync::Digest;
use replisync::fingerprint::{fingerprint_file, fingerprint_reader};
use replisync::reconcile::{PassReport, Reconciler, SyncOptions};
use replisync::sink::MemorySink;
use replisync::snapshot::FileHasher;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use walkdir::WalkDir;

/// Source/replica pair in a temporary directory
pub struct TestTrees {
    pub temp_dir: TempDir,
    pub source: PathBuf,
    pub replica: PathBuf,
}

impl TestTrees {
    /// Create an empty source and an empty replica
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let source = temp_dir.path().join("source");
        let replica = temp_dir.path().join("replica");
        fs::create_dir_all(&source)?;
        fs::create_dir_all(&replica)?;
        Ok(Self {
            temp_dir,
            source,
            replica,
        })
    }

    pub fn write_source(&self, rel: &str, content: impl AsRef<[u8]>) -> Result<PathBuf> {
        write_file(&self.source, rel, content.as_ref())
    }

    pub fn write_replica(&self, rel: &str, content: impl AsRef<[u8]>) -> Result<PathBuf> {
        write_file(&self.replica, rel, content.as_ref())
    }

    pub fn read_replica(&self, rel: &str) -> Result<String> {
        Ok(fs::read_to_string(self.replica.join(rel))?)
    }

    /// Run one pass with the given options
    pub fn reconcile_with(&self, options: SyncOptions, sink: &MemorySink) -> Result<PassReport> {
        Ok(Reconciler::new(options)?.reconcile(&self.source, &self.replica, sink))
    }

    /// Run one pass with default options
    pub fn reconcile(&self, sink: &MemorySink) -> Result<PassReport> {
        self.reconcile_with(SyncOptions::default(), sink)
    }

    /// Run one pass in which the given files cannot be read
    pub fn reconcile_locked(&self, locked: &[PathBuf], sink: &MemorySink) -> Result<PassReport> {
        let hasher = Arc::new(LockedFiles(locked.to_vec()));
        Ok(Reconciler::new(SyncOptions::default())?
            .with_hasher(hasher)
            .reconcile(&self.source, &self.replica, sink))
    }

    pub fn source_listing(&self) -> BTreeMap<String, Vec<u8>> {
        listing(&self.source)
    }

    pub fn replica_listing(&self) -> BTreeMap<String, Vec<u8>> {
        listing(&self.replica)
    }
}

/// Reads files from disk, except the listed ones which fail mid-read
pub struct LockedFiles(pub Vec<PathBuf>);

impl FileHasher for LockedFiles {
    fn fingerprint(&self, path: &Path) -> io::Result<Digest> {
        if self.0.iter().any(|locked| locked == path) {
            fingerprint_reader(DeniedReader)
        } else {
            fingerprint_file(path)
        }
    }
}

struct DeniedReader;

impl Read for DeniedReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"))
    }
}

pub fn write_file(root: &Path, rel: &str, content: &[u8]) -> Result<PathBuf> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, content)?;
    Ok(path)
}

/// Every regular file under `root`, keyed by slash-separated relative path
pub fn listing(root: &Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e
                .path()
                .strip_prefix(root)
                .unwrap()
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            (rel, fs::read(e.path()).unwrap())
        })
        .collect()
}

/// Make a path unreadable; returns false when the current user can read it anyway (root)
#[cfg(unix)]
pub fn make_unreadable(path: &Path) -> Result<bool> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o000))?;
    let still_readable = if path.is_dir() {
        fs::read_dir(path).is_ok()
    } else {
        fs::read(path).is_ok()
    };
    Ok(!still_readable)
}

#[cfg(unix)]
pub fn restore_permissions(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}
