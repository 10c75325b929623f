//! Content fingerprinting.
//!
//! A [`Digest`] is the change-detection key for a single file: two files are
//! considered equal exactly when their digests are equal. Digests are computed
//! with XXH3-128 over the raw byte stream, read sequentially in
//! [`CHUNK_SIZE`] blocks so memory use does not grow with file size.
//!
//! Digests are never persisted, so the algorithm only has to be consistent
//! within a single pass.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use xxhash_rust::xxh3::{Xxh3, xxh3_128};

/// Size of each read fed into the hash accumulator.
pub const CHUNK_SIZE: usize = 4096;

/// Fixed-size (128-bit) content fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; 16]);

impl Digest {
    const fn from_u128(value: u128) -> Self {
        Self(value.to_be_bytes())
    }
}

impl fmt::LowerHex for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(self, f)
    }
}

/// Fingerprint an in-memory buffer.
#[must_use]
pub fn fingerprint_bytes(data: &[u8]) -> Digest {
    Digest::from_u128(xxh3_128(data))
}

/// Fingerprint a byte stream, reading it to exhaustion in [`CHUNK_SIZE`] chunks.
///
/// # Errors
///
/// Returns the first read error other than [`io::ErrorKind::Interrupted`].
pub fn fingerprint_reader<R: Read>(mut reader: R) -> io::Result<Digest> {
    let mut hasher = Xxh3::new();
    let mut buffer = [0u8; CHUNK_SIZE];

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(Digest::from_u128(hasher.digest128()))
}

/// Fingerprint the file at `path`.
///
/// The file handle is dropped on every return path.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or a read fails mid-stream.
pub fn fingerprint_file(path: &Path) -> io::Result<Digest> {
    let file = File::open(path)?;
    fingerprint_reader(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct FailingReader {
        remaining_ok: usize,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.remaining_ok == 0 {
                return Err(io::Error::other("device went away"));
            }
            self.remaining_ok -= 1;
            buf.fill(b'x');
            Ok(buf.len())
        }
    }

    #[test]
    fn test_fingerprint_bytes() {
        let hash1 = fingerprint_bytes(b"Hello, World!");
        let hash2 = fingerprint_bytes(b"Hello, World!");
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.to_string().len(), 32);

        let hash3 = fingerprint_bytes(b"Different data");
        assert_ne!(hash1, hash3);
    }

    #[test]
    fn test_streaming_matches_one_shot() -> io::Result<()> {
        // Spans several chunks plus a partial tail.
        let data: Vec<u8> = (0..CHUNK_SIZE * 3 + 17).map(|i| (i % 251) as u8).collect();
        assert_eq!(fingerprint_reader(&data[..])?, fingerprint_bytes(&data));
        Ok(())
    }

    #[test]
    fn test_empty_stream() -> io::Result<()> {
        assert_eq!(fingerprint_reader(io::empty())?, fingerprint_bytes(b""));
        Ok(())
    }

    #[test]
    fn test_fingerprint_file() -> io::Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("test.txt");
        std::fs::write(&file_path, "Test content for hashing")?;

        let hash = fingerprint_file(&file_path)?;
        assert_eq!(hash, fingerprint_bytes(b"Test content for hashing"));
        Ok(())
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempdir().unwrap();
        let err = fingerprint_file(&dir.path().join("nope")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_read_failure_mid_stream_propagates() {
        let err = fingerprint_reader(FailingReader { remaining_ok: 2 }).unwrap_err();
        assert_eq!(err.to_string(), "device went away");
    }

    #[test]
    fn test_display_is_lowercase_hex() {
        let rendered = fingerprint_bytes(b"hello").to_string();
        assert_eq!(rendered.len(), 32);
        assert!(rendered.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')));
    }
}
