//! Replica locking to prevent overlapping passes against the same replica
//!
//! Two processes mirroring into the same replica would race: one could delete
//! a file while the other is mid-copy. Each pass holds an exclusive advisory
//! lock on a file derived from the replica's canonical path. Lock files live
//! outside both trees so they never show up in a snapshot.

use crate::fingerprint::fingerprint_bytes;
use crate::utils::paths::{make_absolute, normalize_lexically};
use anyhow::{Context, Result, bail};
use fs4::fs_std::FileExt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

/// Default time to wait for a competing pass to finish
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause between acquisition attempts
const RETRY_INTERVAL: Duration = Duration::from_millis(25);

/// Holds an exclusive lock on a replica
///
/// The lock is released when this struct is dropped. The lock file itself is
/// left in place; only the advisory lock on it matters.
#[derive(Debug)]
pub struct ReplicaLock {
    /// Lock file handle
    lock_file: File,
    /// Path to the lock file (for error messages)
    lock_path: PathBuf,
}

impl ReplicaLock {
    /// Directory used when none is configured
    #[must_use]
    pub fn default_dir() -> PathBuf {
        std::env::temp_dir().join("replisync-locks")
    }

    /// Lock file path for `replica` inside `locks_dir`
    ///
    /// # Errors
    ///
    /// Returns an error if the replica path cannot be made absolute
    pub fn lock_path_for(locks_dir: &Path, replica: &Path) -> Result<PathBuf> {
        let absolute = match replica.canonicalize() {
            Ok(path) => path,
            Err(_) => normalize_lexically(&make_absolute(replica)?),
        };
        let key = fingerprint_bytes(absolute.as_os_str().as_encoded_bytes());
        Ok(locks_dir.join(format!("{key}.lock")))
    }

    /// Acquire the lock for `replica`, waiting up to `timeout`
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Cannot create the locks directory or lock file
    /// - Another pass still holds the lock when the timeout expires
    pub fn acquire(locks_dir: &Path, replica: &Path, timeout: Duration) -> Result<Self> {
        fs::create_dir_all(locks_dir).with_context(|| {
            format!("Failed to create locks directory: {}", locks_dir.display())
        })?;
        let lock_path = Self::lock_path_for(locks_dir, replica)?;
        let start = Instant::now();

        loop {
            let file = File::options()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)
                .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;

            match file.try_lock_exclusive() {
                Ok(true) => {
                    Self::write_owner(&file, replica);
                    return Ok(Self {
                        lock_file: file,
                        lock_path,
                    });
                }
                Ok(false) | Err(_) if start.elapsed() < timeout => {
                    std::thread::sleep(RETRY_INTERVAL);
                }
                Ok(false) | Err(_) => {
                    bail!(
                        "Another pass is already running against replica '{}' (lock: {})",
                        replica.display(),
                        lock_path.display()
                    );
                }
            }
        }
    }

    /// Path of the held lock file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.lock_path
    }

    /// Record who holds the lock, for debugging stuck locks
    fn write_owner(file: &File, replica: &Path) {
        let mut file_ref = file;
        let _ = file.set_len(0);
        let _ = writeln!(
            file_ref,
            "replica={}\npid={}\ntime={}",
            replica.display(),
            std::process::id(),
            humantime::format_rfc3339(SystemTime::now())
        );
    }
}

impl Drop for ReplicaLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.lock_file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_and_release() {
        let temp = TempDir::new().unwrap();
        let locks = temp.path().join("locks");
        let replica = temp.path().join("replica");

        let lock = ReplicaLock::acquire(&locks, &replica, Duration::ZERO).unwrap();
        assert!(lock.path().exists());
        let contents = fs::read_to_string(lock.path()).unwrap();
        assert!(contents.contains(&format!("pid={}", std::process::id())));
        drop(lock);

        ReplicaLock::acquire(&locks, &replica, Duration::ZERO).unwrap();
    }

    #[test]
    fn test_concurrent_lock_fails_after_timeout() {
        let temp = TempDir::new().unwrap();
        let locks = temp.path().join("locks");
        let replica = temp.path().join("replica");
        let _held = ReplicaLock::acquire(&locks, &replica, Duration::ZERO).unwrap();

        let start = Instant::now();
        let result = ReplicaLock::acquire(&locks, &replica, Duration::from_millis(100));
        let elapsed = start.elapsed();

        assert!(result.is_err(), "Second lock acquisition should fail");
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
    }

    #[test]
    fn test_different_replicas_do_not_conflict() {
        let temp = TempDir::new().unwrap();
        let locks = temp.path().join("locks");
        let _a = ReplicaLock::acquire(&locks, &temp.path().join("a"), Duration::ZERO).unwrap();
        assert!(ReplicaLock::acquire(&locks, &temp.path().join("b"), Duration::ZERO).is_ok());
    }

    #[test]
    fn test_equivalent_spellings_share_a_lock() {
        let temp = TempDir::new().unwrap();
        let locks = temp.path().join("locks");
        let replica = temp.path().join("replica");
        let dotted = temp.path().join("x").join("..").join("replica");

        assert_eq!(
            ReplicaLock::lock_path_for(&locks, &replica).unwrap(),
            ReplicaLock::lock_path_for(&locks, &dotted).unwrap()
        );
    }
}
