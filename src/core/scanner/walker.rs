//! Directory walking and fingerprint grouping using walkdir and rayon.

use super::{extension_of, DuplicateGroup, FileFilter, FilterConfig};
use crate::core::hasher::{ContentHasher, Fingerprint, DEFAULT_CHUNK_SIZE};
use crate::error::{HashError, ScanError};
use crate::events::{null_sender, EventSender};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Configuration for the directory scanner
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Maximum directory depth (None = unlimited)
    pub max_depth: Option<usize>,
    /// Bytes read per hashing step
    pub chunk_size: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Finds content-identical files under a root folder.
///
/// Stateless apart from its configuration; every call re-reads the disk.
#[derive(Debug, Clone)]
pub struct DuplicateScanner {
    config: ScanConfig,
    hasher: ContentHasher,
}

impl DuplicateScanner {
    /// Create a new scanner with the given configuration
    pub fn new(config: ScanConfig) -> Result<Self, HashError> {
        let hasher = ContentHasher::new(config.chunk_size)?;
        Ok(Self { config, hasher })
    }

    pub fn hasher(&self) -> ContentHasher {
        self.hasher
    }

    /// Group filtered-in files under `root` by fingerprint
    pub fn find_duplicates(
        &self,
        root: &Path,
        filters: &FilterConfig,
    ) -> Result<Vec<DuplicateGroup>, ScanError> {
        self.find_duplicates_with_events(root, filters, &null_sender())
    }

    /// Group files by fingerprint, reporting skipped files as debug events.
    ///
    /// Files that fail to hash are left out of every group; the scan carries on.
    pub fn find_duplicates_with_events(
        &self,
        root: &Path,
        filters: &FilterConfig,
        events: &EventSender,
    ) -> Result<Vec<DuplicateGroup>, ScanError> {
        let filter = FileFilter::new(filters.clone());
        let candidates: Vec<PathBuf> = self
            .walk_files(root, events)?
            .into_iter()
            .filter(|path| filter.passes(path))
            .collect();

        // Order is preserved by indexed collect
        let hashed: Vec<(PathBuf, Result<Fingerprint, HashError>)> = candidates
            .into_par_iter()
            .map(|path| {
                let result = self.hasher.hash_file(&path);
                (path, result)
            })
            .collect();

        let mut by_fingerprint: BTreeMap<Fingerprint, Vec<PathBuf>> = BTreeMap::new();
        for (path, result) in hashed {
            match result {
                Ok(fingerprint) => by_fingerprint.entry(fingerprint).or_default().push(path),
                Err(e) => events.debug(format!("Skipping unhashable file: {}", e)),
            }
        }

        Ok(by_fingerprint
            .into_iter()
            .filter(|(_, paths)| paths.len() > 1)
            .map(|(fingerprint, paths)| DuplicateGroup { fingerprint, paths })
            .collect())
    }

    /// Distinct lower-cased extensions of all files under `root`
    pub fn available_extensions(&self, root: &Path) -> Result<BTreeSet<String>, ScanError> {
        Ok(self
            .walk_files(root, &null_sender())?
            .iter()
            .map(|path| extension_of(path))
            .filter(|ext| !ext.is_empty())
            .collect())
    }

    /// All non-directory entries under `root`, sorted by name at each level
    fn walk_files(&self, root: &Path, events: &EventSender) -> Result<Vec<PathBuf>, ScanError> {
        if !root.is_dir() {
            return Err(ScanError::DirectoryNotFound {
                path: root.to_path_buf(),
            });
        }

        let mut walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name();
        if let Some(depth) = self.config.max_depth {
            walker = walker.max_depth(depth);
        }

        let mut files = Vec::new();
        for entry_result in walker {
            match entry_result {
                Ok(entry) => {
                    if !entry.file_type().is_dir() {
                        files.push(entry.into_path());
                    }
                }
                Err(e) => {
                    let path = e.path().map(|p| p.to_path_buf()).unwrap_or_default();

                    let error = if e.io_error().map(|e| e.kind())
                        == Some(std::io::ErrorKind::PermissionDenied)
                    {
                        ScanError::PermissionDenied { path }
                    } else {
                        ScanError::ReadDirectory {
                            path,
                            source: std::io::Error::other(e.to_string()),
                        }
                    };
                    events.debug(format!("Skipping unreadable entry: {}", error));
                }
            }
        }

        Ok(files)
    }
}

impl Default for DuplicateScanner {
    fn default() -> Self {
        Self {
            config: ScanConfig::default(),
            hasher: ContentHasher::default(),
        }
    }
}

/// Group filtered-in files under `root` with default settings
pub fn find_duplicates(root: &Path, filters: &FilterConfig) -> Result<Vec<DuplicateGroup>, ScanError> {
    DuplicateScanner::default().find_duplicates(root, filters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hasher::hash_file;
    use crate::events::{Event, EventChannel, LogLevel};
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    fn create_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content).unwrap();
        path
    }

    #[test]
    fn empty_directory_has_no_groups() {
        let temp_dir = TempDir::new().unwrap();
        let groups = find_duplicates(temp_dir.path(), &FilterConfig::default()).unwrap();
        assert!(groups.is_empty());
    }

    #[test]
    fn groups_identical_files() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "a.txt", b"X");
        create_file(temp_dir.path(), "b.txt", b"X");
        create_file(temp_dir.path(), "c.txt", b"Y");

        let groups = find_duplicates(temp_dir.path(), &FilterConfig::default()).unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
        assert!(groups[0].paths[0].ends_with("a.txt"));
        assert!(groups[0].paths[1].ends_with("b.txt"));
    }

    #[test]
    fn every_member_shares_the_group_fingerprint() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        create_file(temp_dir.path(), "one.dat", b"payload");
        create_file(&nested, "two.dat", b"payload");
        create_file(&nested, "three.dat", b"payload");
        create_file(temp_dir.path(), "other.dat", b"other");
        create_file(&nested, "other-copy.dat", b"other");

        let groups = find_duplicates(temp_dir.path(), &FilterConfig::default()).unwrap();

        assert_eq!(groups.len(), 2);
        for group in &groups {
            assert!(group.len() >= 2);
            for path in &group.paths {
                assert_eq!(hash_file(path, 1024).unwrap(), group.fingerprint);
            }
        }
    }

    #[test]
    fn repeated_scans_are_identical() {
        let temp_dir = TempDir::new().unwrap();
        for i in 0..5 {
            create_file(temp_dir.path(), &format!("copy{}.txt", i), b"dup");
        }
        create_file(temp_dir.path(), "pair-a.bin", b"pair");
        create_file(temp_dir.path(), "pair-b.bin", b"pair");

        let scanner = DuplicateScanner::default();
        let first = scanner.find_duplicates(temp_dir.path(), &FilterConfig::default()).unwrap();
        let second = scanner.find_duplicates(temp_dir.path(), &FilterConfig::default()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn extension_filter_limits_hashing() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "photo.jpg", &[7u8; 10 * 1024]);
        create_file(temp_dir.path(), "photo-copy.jpg", &[7u8; 10 * 1024]);
        create_file(temp_dir.path(), "doc.txt", &[7u8; 10 * 1024]);

        let filters = FilterConfig::enabled().with_extensions([".jpg"]);
        let groups = find_duplicates(temp_dir.path(), &filters).unwrap();

        assert_eq!(groups.len(), 1);
        assert!(groups[0]
            .paths
            .iter()
            .all(|p| p.extension().unwrap() == "jpg"));
    }

    #[test]
    fn singleton_after_filtering_is_dropped() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "photo.jpg", b"same");
        create_file(temp_dir.path(), "doc.txt", b"same");

        let filters = FilterConfig::enabled().with_extensions([".jpg"]);
        let groups = find_duplicates(temp_dir.path(), &filters).unwrap();

        assert!(groups.is_empty());
    }

    #[test]
    fn missing_root_is_an_error() {
        let result = find_duplicates(Path::new("/nonexistent/path/12345"), &FilterConfig::default());
        assert!(matches!(result, Err(ScanError::DirectoryNotFound { .. })));
    }

    #[test]
    fn max_depth_limits_recursion() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("deep");
        fs::create_dir(&nested).unwrap();
        create_file(temp_dir.path(), "top.txt", b"same");
        create_file(&nested, "below.txt", b"same");

        let scanner = DuplicateScanner::new(ScanConfig {
            max_depth: Some(1),
            ..ScanConfig::default()
        })
        .unwrap();

        let groups = scanner.find_duplicates(temp_dir.path(), &FilterConfig::default()).unwrap();
        assert!(groups.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_is_skipped_with_debug_trace() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "a.txt", b"X");
        create_file(temp_dir.path(), "b.txt", b"X");
        let locked = create_file(temp_dir.path(), "c.txt", b"X");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Root can read anything; nothing to assert in that case
        if File::open(&locked).is_ok() {
            return;
        }

        let (sender, receiver) = EventChannel::new();
        let groups = DuplicateScanner::default()
            .find_duplicates_with_events(temp_dir.path(), &FilterConfig::default(), &sender)
            .unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
        let traced = receiver.drain().into_iter().any(|event| {
            matches!(event, Event::Log(log) if log.level == LogLevel::Debug && log.message.contains("c.txt"))
        });
        assert!(traced);
    }

    #[cfg(unix)]
    #[test]
    fn directory_symlink_cycles_are_not_followed() {
        let temp_dir = TempDir::new().unwrap();
        create_file(temp_dir.path(), "a.txt", b"X");
        create_file(temp_dir.path(), "b.txt", b"X");
        std::os::unix::fs::symlink(temp_dir.path(), temp_dir.path().join("loop")).unwrap();

        let groups = find_duplicates(temp_dir.path(), &FilterConfig::default()).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
    }

    #[test]
    fn available_extensions_are_distinct_and_lowercase() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        create_file(temp_dir.path(), "a.TXT", b"1");
        create_file(temp_dir.path(), "b.txt", b"2");
        create_file(&nested, "c.Jpg", b"3");
        create_file(&nested, "README", b"4");

        let extensions = DuplicateScanner::default()
            .available_extensions(temp_dir.path())
            .unwrap();

        let expected: BTreeSet<String> = [".jpg", ".txt"].iter().map(|s| s.to_string()).collect();
        assert_eq!(extensions, expected);
    }
}
