//! Tests for codebase module.

#[cfg(test)]
mod tests {
    use crate::codebase::diff::{apply, diff, diff_many};
    use crate::codebase::snapshot::{build, normalize_extensions, ScanOptions, SnapshotError};
    use crate::codebase::types::Codebase;
    use std::collections::HashSet;
    use std::fs::{self, File};
    use std::io::Write;
    use std::path::Path;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn write_file(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut f = File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    fn bump_mtime(root: &Path, relative: &str) {
        let f = File::options().write(true).open(root.join(relative)).unwrap();
        let later = SystemTime::now() + Duration::from_secs(60);
        f.set_modified(later).unwrap();
    }

    fn live_paths(root: &Path, extensions: &[String]) -> HashSet<String> {
        build(root, extensions, &ScanOptions::default())
            .unwrap()
            .snapshot
            .paths()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_extension_filter_keeps_matching_files_only() {
        let temp_dir = TempDir::new().unwrap();
        write_file(temp_dir.path(), "a.py", "print(1)\n\n");
        write_file(temp_dir.path(), "b.txt", "hello");

        let scan = build(temp_dir.path(), &normalize_extensions(&["py"]), &ScanOptions::default())
            .unwrap();

        assert_eq!(scan.snapshot.len(), 1);
        assert_eq!(scan.snapshot.content("a.py"), Some("print(1)\n\n"));
        assert!(scan.snapshot.get("b.txt").is_none());
        assert!(scan.warnings.is_empty());
    }

    #[test]
    fn test_empty_filter_includes_all_files() {
        let temp_dir = TempDir::new().unwrap();
        write_file(temp_dir.path(), "a.py", "x");
        write_file(temp_dir.path(), "nested/b.txt", "y");

        let paths = live_paths(temp_dir.path(), &[]);
        assert_eq!(
            paths,
            HashSet::from(["a.py".to_string(), "nested/b.txt".to_string()])
        );
    }

    #[test]
    fn test_build_cache_directories_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        write_file(temp_dir.path(), "pkg/mod.py", "x");
        write_file(temp_dir.path(), "pkg/__pycache__/mod.cpython-311.py", "cached");
        write_file(temp_dir.path(), "node_modules/dep.py", "dep");

        let options = ScanOptions {
            ignore_dirs: vec!["node_modules".into()],
            ..ScanOptions::default()
        };
        let scan = build(temp_dir.path(), &[], &options).unwrap();

        assert_eq!(scan.snapshot.paths().collect::<Vec<_>>(), vec!["pkg/mod.py"]);
    }

    #[test]
    fn test_invalid_root_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        write_file(temp_dir.path(), "file.py", "x");

        let missing = build(&temp_dir.path().join("missing"), &[], &ScanOptions::default());
        assert!(matches!(missing, Err(SnapshotError::InvalidPath { .. })));

        let not_dir = build(&temp_dir.path().join("file.py"), &[], &ScanOptions::default());
        assert!(matches!(not_dir, Err(SnapshotError::InvalidPath { .. })));
    }

    #[test]
    fn test_empty_directory_gives_empty_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let scan = build(temp_dir.path(), &[], &ScanOptions::default()).unwrap();
        assert!(scan.snapshot.is_empty());
    }

    #[test]
    fn test_oversized_file_becomes_warning() {
        let temp_dir = TempDir::new().unwrap();
        write_file(temp_dir.path(), "big.txt", &"x".repeat(64));
        write_file(temp_dir.path(), "small.txt", "x");

        let options = ScanOptions {
            max_file_size: 16,
            ..ScanOptions::default()
        };
        let scan = build(temp_dir.path(), &[], &options).unwrap();

        assert_eq!(scan.snapshot.paths().collect::<Vec<_>>(), vec!["small.txt"]);
        assert_eq!(scan.warnings.len(), 1);
        assert!(scan.warnings[0].path.ends_with("big.txt"));
    }

    #[test]
    fn test_diff_of_unmodified_tree_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        write_file(temp_dir.path(), "a.py", "x");
        write_file(temp_dir.path(), "sub/b.py", "y");

        let options = ScanOptions::default();
        let scan = build(temp_dir.path(), &[], &options).unwrap();
        let result = diff(temp_dir.path(), &[], &scan.snapshot, &options).unwrap();

        assert!(result.transformation.is_empty());
        assert!(result.changed.is_empty());
    }

    #[test]
    fn test_diff_classifies_additions_updates_and_deletions() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write_file(root, "keep.py", "same");
        write_file(root, "edit.py", "before");
        write_file(root, "gone.py", "bye");

        let options = ScanOptions::default();
        let previous = build(root, &[], &options).unwrap().snapshot;

        write_file(root, "edit.py", "after");
        bump_mtime(root, "edit.py");
        fs::remove_file(root.join("gone.py")).unwrap();
        write_file(root, "new.py", "hello");

        let result = diff(root, &[], &previous, &options).unwrap();
        let t = &result.transformation;

        assert_eq!(t.additions, vec!["new.py".to_string()]);
        assert_eq!(t.deletions, vec!["gone.py".to_string()]);
        assert_eq!(t.updates.len(), 1);
        assert_eq!(t.updates[0].path, "edit.py");

        let mut changed: Vec<_> = result
            .changed
            .iter()
            .map(|c| (c.path.as_str(), c.content.as_str()))
            .collect();
        changed.sort();
        assert_eq!(changed, vec![("edit.py", "after"), ("new.py", "hello")]);
    }

    #[test]
    fn test_same_bytes_with_new_mtime_counts_as_update() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write_file(root, "a.py", "unchanged");

        let options = ScanOptions::default();
        let previous = build(root, &[], &options).unwrap().snapshot;
        bump_mtime(root, "a.py");

        let result = diff(root, &[], &previous, &options).unwrap();
        assert_eq!(result.transformation.updates.len(), 1);
        assert_eq!(result.changed[0].content, "unchanged");
    }

    #[test]
    fn test_apply_reproduces_live_path_set() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write_file(root, "a.py", "a");
        write_file(root, "b.py", "b");

        let options = ScanOptions::default();
        let previous = build(root, &[], &options).unwrap().snapshot;

        fs::remove_file(root.join("a.py")).unwrap();
        write_file(root, "c/d.py", "d");
        write_file(root, "b.py", "b2");
        bump_mtime(root, "b.py");

        let result = diff(root, &[], &previous, &options).unwrap();
        let next = apply(root, &previous, &result.transformation, &options);

        let next_paths: HashSet<String> = next.paths().map(str::to_string).collect();
        assert_eq!(next_paths, live_paths(root, &[]));
        assert_eq!(next.content("b.py"), Some("b2"));

        let again = diff(root, &[], &next, &options).unwrap();
        assert!(again.transformation.is_empty());
    }

    #[test]
    fn test_diff_many_labels_each_root() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write_file(first.path(), "a.py", "a");

        let options = ScanOptions::default();
        let codebases: Vec<Codebase> = [first.path(), second.path()]
            .iter()
            .map(|root| Codebase {
                root: root.to_path_buf(),
                extensions: Vec::new(),
                snapshot: build(root, &[], &options).unwrap().snapshot,
            })
            .collect();

        write_file(second.path(), "new.py", "fresh");

        let result = diff_many(&codebases, &options);

        assert!(result.has_changes());
        assert!(result
            .summary
            .contains(&format!("Codebase: {}", first.path().display())));
        assert!(result
            .summary
            .contains(&format!("Codebase: {}", second.path().display())));
        assert!(result.summary.contains("Added files:\n- new.py"));
        assert!(result.changed_content.starts_with("Contents of file: "));
        assert!(result.changed_content.ends_with("fresh"));
        assert!(result.diffs[0].transformation.is_empty());
    }

    #[test]
    fn test_diff_many_skips_missing_root() {
        let kept = TempDir::new().unwrap();
        let removed = TempDir::new().unwrap();
        write_file(kept.path(), "a.py", "a");
        write_file(removed.path(), "b.py", "b");

        let options = ScanOptions::default();
        let codebases: Vec<Codebase> = [kept.path(), removed.path()]
            .iter()
            .map(|root| Codebase {
                root: root.to_path_buf(),
                extensions: Vec::new(),
                snapshot: build(root, &[], &options).unwrap().snapshot,
            })
            .collect();

        let removed_root = removed.path().to_path_buf();
        removed.close().unwrap();
        write_file(kept.path(), "c.py", "c");

        let result = diff_many(&codebases, &options);

        assert_eq!(result.diffs.len(), 2);
        assert_eq!(result.diffs[0].transformation.additions, vec!["c.py".to_string()]);
        assert!(result.diffs[1].transformation.is_empty());
        assert_eq!(result.diffs[1].warnings.len(), 1);
        assert_eq!(result.diffs[1].warnings[0].path, removed_root);
    }
}
