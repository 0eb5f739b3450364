//! Change detection between a snapshot and the live filesystem.
//!
//! Changes are detected by exact modification-time comparison only. A file
//! rewritten with identical bytes counts as updated, and a rewrite that lands
//! on the same mtime (coarse filesystem timestamps) is missed. Content hashing
//! is deliberately not used as a fallback.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;
use tracing::debug;

use super::snapshot::{read_file, read_mtime, walk_files, ScanOptions, SnapshotError};
use super::types::{
    ChangedFileContent, Codebase, FileUpdate, ScanWarning, Snapshot, Transformation,
};

/// Outcome of comparing one root against its previous snapshot.
#[derive(Debug, Clone, Default)]
pub struct Diff {
    pub transformation: Transformation,
    /// Current text of every added or updated file. Deleted files have no entry.
    pub changed: Vec<ChangedFileContent>,
    pub warnings: Vec<ScanWarning>,
}

/// Outcome of comparing several roots at once.
#[derive(Debug, Clone, Default)]
pub struct MultiDiff {
    /// Human-readable summary, one labelled section per root.
    pub summary: String,
    /// Concatenated contents of every added or updated file.
    pub changed_content: String,
    /// Per-root results, in input order.
    pub diffs: Vec<Diff>,
}

impl MultiDiff {
    pub fn has_changes(&self) -> bool {
        self.diffs.iter().any(|d| !d.transformation.is_empty())
    }
}

/// Re-walk `root` and classify every file against `previous`.
pub fn diff(
    root: &Path,
    extensions: &[String],
    previous: &Snapshot,
    options: &ScanOptions,
) -> Result<Diff, SnapshotError> {
    let mut result = Diff::default();
    let mut seen: HashSet<String> = HashSet::new();

    for file in walk_files(root, extensions, options)? {
        seen.insert(file.relative.clone());

        let Some(previous_mtime) = previous.mtime(&file.relative) else {
            match read_file(&file.absolute, options) {
                Ok((content, _)) => {
                    result.transformation.additions.push(file.relative.clone());
                    result.changed.push(ChangedFileContent {
                        path: file.relative,
                        content,
                    });
                }
                Err(warning) => result.warnings.push(warning),
            }
            continue;
        };

        let Some(current_mtime) = read_mtime(&file.absolute) else {
            result.warnings.push(ScanWarning {
                path: file.absolute,
                reason: "no modification time".into(),
            });
            continue;
        };

        if current_mtime == previous_mtime {
            continue;
        }

        debug!("File modified (mtime changed): {}", file.relative);
        match read_file(&file.absolute, options) {
            Ok((content, mtime)) => {
                result.transformation.updates.push(FileUpdate {
                    path: file.relative.clone(),
                    mtime,
                });
                result.changed.push(ChangedFileContent {
                    path: file.relative,
                    content,
                });
            }
            Err(warning) => result.warnings.push(warning),
        }
    }

    result.transformation.deletions = previous
        .paths()
        .filter(|p| !seen.contains(*p))
        .map(str::to_string)
        .collect();

    debug!(
        "Diff of {}: {} added, {} updated, {} deleted",
        root.display(),
        result.transformation.additions.len(),
        result.transformation.updates.len(),
        result.transformation.deletions.len()
    );

    Ok(result)
}

/// Fold a transformation into `previous`, producing the next snapshot.
///
/// Added and updated files are re-read from disk so the stored mtimes are
/// fresh. A file that vanished since the diff is left out.
pub fn apply(
    root: &Path,
    previous: &Snapshot,
    transformation: &Transformation,
    options: &ScanOptions,
) -> Snapshot {
    let mut next = previous.clone();

    for path in &transformation.deletions {
        next.remove(path);
    }

    let changed = transformation
        .additions
        .iter()
        .map(|path| (path, None))
        .chain(transformation.updates.iter().map(|u| (&u.path, Some(u.mtime))));

    for (path, seen_mtime) in changed {
        match read_file(&root.join(path), options) {
            Ok((content, mtime)) => {
                if seen_mtime.is_some_and(|seen| seen != mtime) {
                    debug!("{} changed again since the diff", path);
                }
                next.insert(path.clone(), content, mtime);
            }
            Err(_) => {
                next.remove(path);
            }
        }
    }

    next
}

/// Human-readable description of a transformation. Empty when nothing changed.
pub fn format_transformation(transformation: &Transformation) -> String {
    let mut out = String::new();

    let sections: [(&str, Vec<&str>); 3] = [
        (
            "Added files:",
            transformation.additions.iter().map(String::as_str).collect(),
        ),
        (
            "Deleted files:",
            transformation.deletions.iter().map(String::as_str).collect(),
        ),
        (
            "Updated files:",
            transformation.updates.iter().map(|u| u.path.as_str()).collect(),
        ),
    ];

    for (title, paths) in sections {
        if paths.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{}", title);
        for path in paths {
            let _ = writeln!(out, "- {}", path);
        }
        out.push('\n');
    }

    out.trim().to_string()
}

/// Run [`diff`] for each codebase and concatenate the results.
///
/// A root that can no longer be walked contributes an empty diff and a
/// warning, so its snapshot stays as it was until the root is back.
pub fn diff_many(codebases: &[Codebase], options: &ScanOptions) -> MultiDiff {
    let mut result = MultiDiff::default();

    for codebase in codebases {
        let diff = match diff(&codebase.root, &codebase.extensions, &codebase.snapshot, options) {
            Ok(diff) => diff,
            Err(e) => {
                result.diffs.push(Diff {
                    warnings: vec![ScanWarning {
                        path: codebase.root.clone(),
                        reason: e.to_string(),
                    }],
                    ..Diff::default()
                });
                continue;
            }
        };

        let _ = writeln!(result.summary, "Codebase: {}", codebase.root.display());
        result
            .summary
            .push_str(&format_transformation(&diff.transformation));
        result.summary.push_str("\n\n");

        for changed in &diff.changed {
            let _ = write!(
                result.changed_content,
                "Contents of file: {}\n\n{}\n\n",
                codebase.root.join(&changed.path).display(),
                changed.content
            );
        }

        result.diffs.push(diff);
    }

    result.summary = result.summary.trim().to_string();
    result.changed_content = result.changed_content.trim().to_string();

    result
}
