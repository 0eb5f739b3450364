//! Directory walking and snapshot construction.
//!
//! Uses `ignore::WalkBuilder` with the standard filters switched off, so every
//! file under the root is visited except those inside a build-cache directory.

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use ignore::WalkBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, warn};

use super::types::{ScanWarning, Snapshot};

/// Directory names that are never descended into.
pub const BUILD_CACHE_DIRS: &[&str] = &["__pycache__"];

/// Files larger than this are skipped.
pub const MAX_READABLE_FILE_SIZE: u64 = 1024 * 1024;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("the path {path} does not exist or is not a directory")]
    InvalidPath { path: PathBuf },
}

/// Knobs for a directory walk.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Extra directory names to skip, on top of [`BUILD_CACHE_DIRS`].
    pub ignore_dirs: Vec<String>,
    pub max_file_size: u64,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            ignore_dirs: Vec::new(),
            max_file_size: MAX_READABLE_FILE_SIZE,
        }
    }
}

/// Result of a full walk: the snapshot plus any files that had to be skipped.
#[derive(Debug, Clone, Default)]
pub struct Scan {
    pub snapshot: Snapshot,
    pub warnings: Vec<ScanWarning>,
}

/// A file found by the walker, before its content is read.
pub(super) struct WalkedFile {
    pub absolute: PathBuf,
    pub relative: String,
}

/// Normalise an extension list: drop empty entries and leading dots.
pub fn normalize_extensions<S: AsRef<str>>(extensions: &[S]) -> Vec<String> {
    extensions
        .iter()
        .map(|e| e.as_ref().trim().trim_start_matches('.').to_string())
        .filter(|e| !e.is_empty())
        .collect()
}

/// Whether a file name passes the extension filter. Empty filter matches all.
pub fn matches_extension(file_name: &str, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    extensions.iter().any(|ext| {
        let ext = ext.trim_start_matches('.');
        file_name.len() > ext.len()
            && file_name.ends_with(ext)
            && file_name.as_bytes()[file_name.len() - ext.len() - 1] == b'.'
    })
}

fn is_cache_dir(name: &str, options: &ScanOptions) -> bool {
    BUILD_CACHE_DIRS.contains(&name) || options.ignore_dirs.iter().any(|d| d == name)
}

fn check_root(root: &Path) -> Result<(), SnapshotError> {
    if root.is_dir() {
        Ok(())
    } else {
        Err(SnapshotError::InvalidPath {
            path: root.to_path_buf(),
        })
    }
}

/// Walk `root` and yield every regular file passing the extension filter.
pub(super) fn walk_files(
    root: &Path,
    extensions: &[String],
    options: &ScanOptions,
) -> Result<Vec<WalkedFile>, SnapshotError> {
    check_root(root)?;

    let mut builder = WalkBuilder::new(root);
    builder.standard_filters(false);
    builder.follow_links(false);

    let skip = options.clone();
    builder.filter_entry(move |entry| {
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        !(is_dir && entry.depth() > 0 && is_cache_dir(&entry.file_name().to_string_lossy(), &skip))
    });

    let mut files = Vec::new();
    for entry in builder.build() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Error walking directory: {}", e);
                continue;
            }
        };

        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        if !matches_extension(&file_name, extensions) {
            continue;
        }

        let path = entry.path();
        let relative = match path.strip_prefix(root) {
            Ok(p) => p.to_string_lossy().replace('\\', "/"),
            Err(_) => {
                warn!("Failed to get relative path for {}", path.display());
                continue;
            }
        };

        files.push(WalkedFile {
            absolute: path.to_path_buf(),
            relative,
        });
    }

    Ok(files)
}

fn encodings() -> [&'static Encoding; 2] {
    [UTF_8, WINDOWS_1252]
}

/// Decode bytes with the first encoding that accepts them without errors.
pub fn decode_text(bytes: &[u8]) -> Option<String> {
    encodings().into_iter().find_map(|encoding| {
        encoding
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(|text| {
                if encoding != UTF_8 {
                    debug!("Decoded file as {}", encoding.name());
                }
                text.into_owned()
            })
    })
}

/// Modification time of a file, if the filesystem reports one.
pub fn read_mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).ok().and_then(|m| m.modified().ok())
}

/// Read a file's text and mtime, or explain why it was skipped.
pub(super) fn read_file(
    path: &Path,
    options: &ScanOptions,
) -> Result<(String, SystemTime), ScanWarning> {
    let skip = |reason: String| ScanWarning {
        path: path.to_path_buf(),
        reason,
    };

    let metadata = fs::metadata(path).map_err(|e| skip(format!("failed to stat: {}", e)))?;
    if metadata.len() > options.max_file_size {
        return Err(skip(format!("file too large ({} bytes)", metadata.len())));
    }
    let mtime = metadata
        .modified()
        .map_err(|e| skip(format!("no modification time: {}", e)))?;

    let bytes = fs::read(path).map_err(|e| skip(format!("failed to read: {}", e)))?;
    let content = decode_text(&bytes).ok_or_else(|| skip("no supported text encoding".into()))?;

    Ok((content, mtime))
}

/// Walk `root` and capture every matching file.
///
/// Never fails for zero matches; unreadable files become warnings.
pub fn build(root: &Path, extensions: &[String], options: &ScanOptions) -> Result<Scan, SnapshotError> {
    debug!("Scanning codebase: {}", root.display());

    let mut scan = Scan::default();
    for file in walk_files(root, extensions, options)? {
        match read_file(&file.absolute, options) {
            Ok((content, mtime)) => scan.snapshot.insert(file.relative, content, mtime),
            Err(warning) => scan.warnings.push(warning),
        }
    }

    debug!(
        "Loaded {} files ({} skipped) from {}",
        scan.snapshot.len(),
        scan.warnings.len(),
        root.display()
    );

    Ok(scan)
}

/// Combine two snapshots; on a key collision the entry from `later` wins.
pub fn merge(earlier: &Snapshot, later: &Snapshot) -> Snapshot {
    let mut merged = earlier.clone();
    for (path, record) in later.iter() {
        merged.insert(path.to_string(), record.content.clone(), record.mtime);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn test_matches_extension() {
        let exts = normalize_extensions(&["py", ".md", ""]);
        assert_eq!(exts, vec!["py", "md"]);
        assert!(matches_extension("main.py", &exts));
        assert!(matches_extension("README.md", &exts));
        assert!(!matches_extension("main.PY", &exts));
        assert!(!matches_extension("happy", &exts));
        assert!(!matches_extension("b.txt", &exts));
        assert!(matches_extension("anything", &[]));
    }

    #[test]
    fn test_decode_text_falls_back_to_windows_1252() {
        assert_eq!(decode_text(b"plain").as_deref(), Some("plain"));
        // 0xE9 is not valid UTF-8 on its own, but is 'é' in Windows-1252.
        assert_eq!(decode_text(b"caf\xe9").as_deref(), Some("café"));
    }

    #[test]
    fn test_merge_later_wins() {
        let t = UNIX_EPOCH + Duration::from_secs(5);
        let mut a = Snapshot::default();
        a.insert("x".into(), "old".into(), t);
        a.insert("y".into(), "y".into(), t);
        let mut b = Snapshot::default();
        b.insert("x".into(), "new".into(), t);
        b.insert("z".into(), "z".into(), t);

        let merged = merge(&a, &b);
        assert_eq!(merged.paths().collect::<Vec<_>>(), vec!["x", "y", "z"]);
        assert_eq!(merged.content("x"), Some("new"));
    }
}
