//! Value types shared by the snapshot, diff and serializer modules.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::SystemTime;

/// Content and modification time of one file inside a [`Snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub content: String,
    pub mtime: SystemTime,
}

/// Point-in-time record of a directory's matched files.
///
/// Keeps directory-walk order. Content and mtime live in the same record, so
/// the path -> content and path -> mtime views always share one key set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: Vec<(String, FileRecord)>,
    index: HashMap<String, usize>,
}

impl Snapshot {
    /// Insert or overwrite a file. An overwritten path keeps its position.
    pub fn insert(&mut self, path: String, content: String, mtime: SystemTime) {
        let record = FileRecord { content, mtime };
        match self.index.get(&path) {
            Some(&idx) => self.entries[idx].1 = record,
            None => {
                self.index.insert(path.clone(), self.entries.len());
                self.entries.push((path, record));
            }
        }
    }

    /// Remove a file, returning its record if it was present.
    pub fn remove(&mut self, path: &str) -> Option<FileRecord> {
        let idx = self.index.remove(path)?;
        let (_, record) = self.entries.remove(idx);
        for (pos, (p, _)) in self.entries.iter().enumerate().skip(idx) {
            self.index.insert(p.clone(), pos);
        }
        Some(record)
    }

    pub fn get(&self, path: &str) -> Option<&FileRecord> {
        self.index.get(path).map(|&idx| &self.entries[idx].1)
    }

    #[cfg(test)]
    pub fn content(&self, path: &str) -> Option<&str> {
        self.get(path).map(|r| r.content.as_str())
    }

    pub fn mtime(&self, path: &str) -> Option<SystemTime> {
        self.get(path).map(|r| r.mtime)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate files in walk order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileRecord)> {
        self.entries.iter().map(|(p, r)| (p.as_str(), r))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(p, _)| p.as_str())
    }

    /// Total size of all file contents in bytes.
    pub fn total_bytes(&self) -> usize {
        self.entries.iter().map(|(_, r)| r.content.len()).sum()
    }
}

/// A path whose modification time changed since the previous snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpdate {
    pub path: String,
    pub mtime: SystemTime,
}

/// Add/delete/update delta between a snapshot and the live filesystem.
///
/// A path appears in at most one of the three lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transformation {
    pub additions: Vec<String>,
    pub deletions: Vec<String>,
    pub updates: Vec<FileUpdate>,
}

impl Transformation {
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.deletions.is_empty() && self.updates.is_empty()
    }
}

/// Full current text of an added or updated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFileContent {
    pub path: String,
    pub content: String,
}

/// A single file that could not be captured during a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanWarning {
    pub path: PathBuf,
    pub reason: String,
}

/// A source root together with its extension filter and last known snapshot.
#[derive(Debug, Clone)]
pub struct Codebase {
    pub root: PathBuf,
    pub extensions: Vec<String>,
    pub snapshot: Snapshot,
}
