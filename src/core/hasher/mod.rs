//! # Hasher Module
//!
//! Computes content fingerprints for files.
//!
//! ## How It Works
//! 1. Open the file
//! 2. Stream it through SHA-256 in fixed-size chunks
//! 3. Compare fingerprints for byte equality
//!
//! Files are never loaded whole, so memory use stays flat for any file size.
//!
//! ## Example
//! ```rust,ignore
//! use folder_dedup::core::hasher::ContentHasher;
//!
//! let hasher = ContentHasher::new(8192)?;
//! let fingerprint = hasher.hash_file(&path)?;
//! println!("{}", fingerprint.short());
//! ```

use crate::error::HashError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::Path;

/// Default read size, matching a typical filesystem page cluster
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// SHA-256 digest of a file's content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Wrap raw digest bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Get the digest as a lowercase hexadecimal string
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// First eight hex characters, for log lines
    pub fn short(&self) -> String {
        self.to_hex()[..8].to_string()
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Streams files through SHA-256
#[derive(Debug, Clone, Copy)]
pub struct ContentHasher {
    chunk_size: usize,
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ContentHasher {
    /// Create a hasher that reads `chunk_size` bytes at a time
    pub fn new(chunk_size: usize) -> Result<Self, HashError> {
        if chunk_size == 0 {
            return Err(HashError::ZeroChunkSize);
        }
        Ok(Self { chunk_size })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Fingerprint a file's content.
    ///
    /// Fails when the file cannot be opened or a read fails mid-stream.
    pub fn hash_file(&self, path: &Path) -> Result<Fingerprint, HashError> {
        let io_error = |source| HashError::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut file = File::open(path).map_err(io_error)?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; self.chunk_size];

        loop {
            let read = match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(io_error(e)),
            };
            hasher.update(&buffer[..read]);
        }

        Ok(Fingerprint(hasher.finalize().into()))
    }

    /// Check whether two files have the same content.
    ///
    /// If either path is a symbolic link the resolved targets are compared
    /// instead, so links are never followed into unrelated trees.
    pub fn files_content_equal(&self, a: &Path, b: &Path) -> Result<bool, HashError> {
        if is_symlink(a) || is_symlink(b) {
            return Ok(resolve(a) == resolve(b));
        }
        Ok(self.hash_file(a)? == self.hash_file(b)?)
    }
}

/// Fingerprint `path` using `chunk_size`-byte reads
pub fn hash_file(path: &Path, chunk_size: usize) -> Result<Fingerprint, HashError> {
    ContentHasher::new(chunk_size)?.hash_file(path)
}

/// Compare two files by content using the default chunk size
pub fn files_content_equal(a: &Path, b: &Path) -> Result<bool, HashError> {
    ContentHasher::default().files_content_equal(a, b)
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|meta| meta.file_type().is_symlink())
        .unwrap_or(false)
}

// A dangling link resolves to its own absolute path.
fn resolve(path: &Path) -> std::path::PathBuf {
    fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content).unwrap();
        path
    }

    #[test]
    fn identical_content_has_identical_fingerprint() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.txt", b"same bytes");
        let b = write_file(&dir, "renamed.bin", b"same bytes");

        let hasher = ContentHasher::default();
        assert_eq!(hasher.hash_file(&a).unwrap(), hasher.hash_file(&b).unwrap());
    }

    #[test]
    fn different_content_differs() {
        let dir = TempDir::new().unwrap();
        let a = write_file(&dir, "a.txt", b"one");
        let b = write_file(&dir, "b.txt", b"two");

        assert!(!files_content_equal(&a, &b).unwrap());
    }

    #[test]
    fn chunk_size_does_not_change_fingerprint() {
        let dir = TempDir::new().unwrap();
        let content: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let path = write_file(&dir, "big.dat", &content);

        let small = hash_file(&path, 7).unwrap();
        let large = hash_file(&path, 65_536).unwrap();
        assert_eq!(small, large);
    }

    #[test]
    fn known_digest_of_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "empty", b"");

        let fingerprint = hash_file(&path, DEFAULT_CHUNK_SIZE).unwrap();
        assert_eq!(
            fingerprint.to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(fingerprint.short(), "e3b0c442");
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = hash_file(Path::new("/nonexistent/file/12345"), DEFAULT_CHUNK_SIZE);
        assert!(matches!(result, Err(HashError::Io { .. })));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        assert!(matches!(ContentHasher::new(0), Err(HashError::ZeroChunkSize)));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_compare_by_target() {
        let dir = TempDir::new().unwrap();
        let target = write_file(&dir, "target.txt", b"content");
        let twin = write_file(&dir, "twin.txt", b"content");
        let link = dir.path().join("link.txt");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        assert!(files_content_equal(&link, &target).unwrap());
        // Same bytes, but the link points elsewhere
        assert!(!files_content_equal(&link, &twin).unwrap());
    }
}
