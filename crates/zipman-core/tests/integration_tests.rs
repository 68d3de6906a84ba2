//! Integration tests for zipman-core.
//!
//! These tests drive `ArchiveManager` against real zip files on disk.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use tempfile::TempDir;
use zipman_core::ArchiveConfig;
use zipman_core::ArchiveError;
use zipman_core::ArchiveManager;
use zipman_core::CodecKind;
use zipman_core::CodecRegistry;
use zipman_core::ExtractMode;
use zipman_core::Filesystem;
use zipman_core::LocalFilesystem;

/// Writes `files` (relative path, content) under `root`.
fn populate(root: &Path, files: &[(&str, &str)]) {
    for (name, content) in files {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}

/// Creates an archive at `dir/archive.zip` holding `entries` and closes it.
fn archive_with(dir: &Path, entries: &[(&str, &str)]) -> PathBuf {
    let path = dir.join("archive.zip");
    let mut manager = ArchiveManager::new();
    manager.make(&path, CodecKind::Zip).unwrap();
    for (name, content) in entries {
        manager.add_string(name, content).unwrap();
    }
    manager.close().unwrap();
    path
}

fn extracted_files(root: &Path) -> Vec<String> {
    let mut names: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    names.sort();
    names
}

#[test]
fn test_round_trip_preserves_order_and_content() {
    let temp = TempDir::new().expect("failed to create temp dir");
    populate(temp.path(), &[("src/foo.txt", "foo"), ("src/bar.txt", "bar")]);
    let path = temp.path().join("out.zip");

    let mut manager = ArchiveManager::new();
    manager
        .make(&path, CodecKind::Zip)
        .unwrap()
        .add(temp.path().join("src/foo.txt"))
        .unwrap()
        .add(temp.path().join("src/bar.txt"))
        .unwrap()
        .save()
        .unwrap();

    assert_eq!(manager.list_files(None).unwrap(), vec!["foo.txt", "bar.txt"]);
    assert_eq!(manager.file_content("foo.txt").unwrap(), b"foo");
    assert_eq!(manager.archive_type(), Some("zip"));
    manager.close().unwrap();

    manager.make(&path, CodecKind::Zip).unwrap();
    assert_eq!(manager.list_files(None).unwrap(), vec!["foo.txt", "bar.txt"]);
    assert_eq!(manager.file_content("bar.txt").unwrap(), b"bar");
}

#[test]
fn test_make_creates_missing_parent_directories() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let path = temp.path().join("deep/nested/dir/archive.zip");

    let mut manager = ArchiveManager::new();
    manager.make(&path, CodecKind::Zip).unwrap();
    assert!(path.parent().unwrap().is_dir());

    manager.close().unwrap();
    assert!(path.is_file());
}

#[test]
fn test_make_rejects_corrupt_archive() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let path = temp.path().join("broken.zip");
    fs::write(&path, "this is not a zip").unwrap();

    let err = ArchiveManager::new()
        .make(&path, CodecKind::Zip)
        .map(|_| ())
        .unwrap_err();
    assert!(matches!(err, ArchiveError::Open { .. }));
}

#[test]
fn test_make_with_unregistered_kind() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let mut registry = CodecRegistry::default();
    registry.unregister(CodecKind::Zip);

    let mut manager = ArchiveManager::new().with_registry(registry);
    let err = manager
        .make(temp.path().join("a.zip"), CodecKind::Zip)
        .map(|_| ())
        .unwrap_err();
    assert!(matches!(err, ArchiveError::InvalidArgument(_)));

    manager
        .make(temp.path().join("a.zip"), CodecKind::Memory)
        .unwrap();
    assert_eq!(manager.archive_type(), Some("memory"));
}

#[test]
#[cfg(unix)]
fn test_make_in_read_only_directory() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().expect("failed to create temp dir");
    let locked = temp.path().join("locked");
    fs::create_dir(&locked).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

    let writable = LocalFilesystem::new().is_writable(&locked);
    let result = ArchiveManager::new()
        .make(locked.join("a.zip"), CodecKind::Zip)
        .map(|_| ());
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    // Permission bits do not bind the superuser.
    if writable {
        return;
    }
    assert!(matches!(result, Err(ArchiveError::NotWritable { .. })));
}

#[test]
fn test_folder_scopes_added_files() {
    let temp = TempDir::new().expect("failed to create temp dir");
    populate(temp.path(), &[("input/file.txt", "data")]);

    let mut manager = ArchiveManager::new();
    manager
        .make(temp.path().join("a.zip"), CodecKind::Zip)
        .unwrap()
        .folder("foo")
        .add(temp.path().join("input/file.txt"))
        .unwrap()
        .home()
        .add(temp.path().join("input/file.txt"))
        .unwrap();

    assert_eq!(
        manager.list_files(None).unwrap(),
        vec!["foo/file.txt", "file.txt"]
    );
}

#[test]
fn test_recursive_add_under_folder() {
    let temp = TempDir::new().expect("failed to create temp dir");
    populate(
        temp.path(),
        &[
            ("tree/foo.txt", "foo"),
            ("tree/bar.txt", "bar"),
            ("tree/bar/foo.txt", "nested"),
        ],
    );

    let mut manager = ArchiveManager::new();
    manager
        .make(temp.path().join("a.zip"), CodecKind::Zip)
        .unwrap()
        .folder("foo")
        .add(temp.path().join("tree"))
        .unwrap()
        .save()
        .unwrap();

    let files = manager.list_files(None).unwrap();
    for expected in ["foo/foo.txt", "foo/bar.txt", "foo/bar/foo.txt"] {
        assert!(files.iter().any(|f| f == expected), "missing {expected}");
    }
    assert_eq!(files.len(), 3);
    assert_eq!(manager.current_folder_path(), "foo");
    assert_eq!(manager.file_content("foo/bar/foo.txt").unwrap(), b"nested");
}

#[test]
#[cfg(unix)]
fn test_recursive_add_skips_symlinked_directories() {
    let temp = TempDir::new().expect("failed to create temp dir");
    populate(temp.path(), &[("tree/a.txt", "a"), ("tree/sub/b.txt", "b")]);
    std::os::unix::fs::symlink(temp.path().join("tree"), temp.path().join("tree/loop")).unwrap();

    let mut manager = ArchiveManager::new();
    manager
        .make(temp.path().join("a.zip"), CodecKind::Zip)
        .unwrap()
        .add(temp.path().join("tree"))
        .unwrap();

    assert_eq!(manager.list_files(None).unwrap(), vec!["a.txt", "sub/b.txt"]);
}

#[test]
fn test_add_collections() {
    let temp = TempDir::new().expect("failed to create temp dir");
    populate(temp.path(), &[("one.txt", "1"), ("two.txt", "2")]);

    let mut named = BTreeMap::new();
    named.insert("renamed/one.txt".to_string(), temp.path().join("one.txt"));

    let mut manager = ArchiveManager::new();
    manager
        .make(temp.path().join("a.zip"), CodecKind::Zip)
        .unwrap()
        .add(vec![temp.path().join("one.txt"), temp.path().join("two.txt")])
        .unwrap()
        .add(named)
        .unwrap()
        .add_as(temp.path().join("two.txt"), "explicit.txt")
        .unwrap();

    assert_eq!(
        manager.list_files(None).unwrap(),
        vec!["one.txt", "two.txt", "renamed/one.txt", "explicit.txt"]
    );
    assert_eq!(manager.file_content("explicit.txt").unwrap(), b"2");
}

#[test]
fn test_remove_then_add_other_entry() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let path = archive_with(temp.path(), &[("foo.txt", "foo")]);

    let mut manager = ArchiveManager::new();
    manager
        .make(&path, CodecKind::Zip)
        .unwrap()
        .remove("foo.txt")
        .unwrap()
        .add_string("foo2.txt", "foo2")
        .unwrap()
        .save()
        .unwrap();

    assert!(!manager.contains("foo.txt").unwrap());
    assert!(manager.contains("foo2.txt").unwrap());
}

#[test]
fn test_removing_absent_entry_is_silent() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let path = archive_with(temp.path(), &[("a.txt", "a"), ("b.txt", "b")]);

    let mut manager = ArchiveManager::new();
    manager.make(&path, CodecKind::Zip).unwrap();
    let before = manager.list_files(None).unwrap();

    manager.remove("missing.txt").unwrap();
    manager.remove_many(&["also-missing.txt"]).unwrap();
    manager.save().unwrap();

    assert_eq!(manager.list_files(None).unwrap(), before);
}

#[test]
fn test_remove_many_uses_exact_names() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let path = archive_with(
        temp.path(),
        &[("foo", "1"), ("foo/bar.txt", "2"), ("foobar", "3")],
    );

    let mut manager = ArchiveManager::new();
    manager
        .make(&path, CodecKind::Zip)
        .unwrap()
        .remove_many(&["foo"])
        .unwrap();

    assert_eq!(
        manager.list_files(None).unwrap(),
        vec!["foo/bar.txt", "foobar"]
    );
}

#[test]
fn test_list_files_regex_filter() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let path = archive_with(
        temp.path(),
        &[
            ("a.txt", "a"),
            ("b.log", "b"),
            ("dir/c.txt", "c"),
            ("d.log", "d"),
        ],
    );

    let mut manager = ArchiveManager::new();
    manager.make(&path, CodecKind::Zip).unwrap();

    assert_eq!(
        manager.list_files(Some(r"/\.txt$/")).unwrap(),
        vec!["a.txt", "dir/c.txt"]
    );
    assert_eq!(
        manager.list_files(Some(r"\.LOG$")).unwrap(),
        Vec::<String>::new()
    );
    assert_eq!(
        manager.list_files(Some(r"/\.LOG$/i")).unwrap(),
        vec!["b.log", "d.log"]
    );
}

#[test]
fn test_list_files_ignores_directory_markers() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let path = temp.path().join("a.zip");

    let mut manager = ArchiveManager::new();
    manager
        .make(&path, CodecKind::Zip)
        .unwrap()
        .add_empty_dir("empty")
        .unwrap()
        .add_string("file.txt", "x")
        .unwrap()
        .save()
        .unwrap();

    assert!(manager.contains("empty/").unwrap());
    assert_eq!(manager.list_files(None).unwrap(), vec!["file.txt"]);
}

#[test]
fn test_whitelist_prefix_and_exact_match() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let path = archive_with(
        temp.path(),
        &[("foo", "1"), ("foo/bar.txt", "2"), ("foobar", "3"), ("baz", "4")],
    );

    let mut manager = ArchiveManager::new();
    manager.make(&path, CodecKind::Zip).unwrap();

    let prefix_dest = temp.path().join("prefix");
    // "foo" as a file and "foo/" as a directory cannot coexist on disk.
    manager
        .extract_to(&prefix_dest, &["foo/", "foob"], ExtractMode::WHITELIST)
        .unwrap();
    assert_eq!(extracted_files(&prefix_dest), vec!["foo/bar.txt", "foobar"]);

    let exact_dest = temp.path().join("exact");
    let report = manager
        .extract_to(
            &exact_dest,
            &["foo"],
            ExtractMode::WHITELIST | ExtractMode::EXACT_MATCH,
        )
        .unwrap();
    assert_eq!(report.files_extracted, 1);
    assert_eq!(extracted_files(&exact_dest), vec!["foo"]);
    assert_eq!(fs::read_to_string(exact_dest.join("foo")).unwrap(), "1");
}

#[test]
fn test_whitelist_and_blacklist_are_complementary() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let path = archive_with(
        temp.path(),
        &[
            ("docs/a.txt", "a"),
            ("docs/b.txt", "b"),
            ("src/main.rs", "m"),
            ("README", "r"),
        ],
    );

    let mut manager = ArchiveManager::new();
    manager.make(&path, CodecKind::Zip).unwrap();

    let white = temp.path().join("white");
    let black = temp.path().join("black");
    manager
        .extract_to(&white, &["docs", "README"], ExtractMode::WHITELIST)
        .unwrap();
    manager
        .extract_to(&black, &["docs", "README"], ExtractMode::BLACKLIST)
        .unwrap();

    let white_files = extracted_files(&white);
    let black_files = extracted_files(&black);
    assert_eq!(white_files, vec!["README", "docs/a.txt", "docs/b.txt"]);
    assert_eq!(black_files, vec!["src/main.rs"]);
}

#[test]
fn test_extract_scoped_to_folder() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let path = archive_with(
        temp.path(),
        &[
            ("foo/a.txt", "a"),
            ("foo/sub/b.txt", "b"),
            ("foobar/c.txt", "c"),
            ("d.txt", "d"),
        ],
    );

    let mut manager = ArchiveManager::new();
    manager.make(&path, CodecKind::Zip).unwrap();

    let dest = temp.path().join("scoped");
    let report = manager
        .folder("foo/")
        .extract_to_default(&dest, &[] as &[&str])
        .unwrap();

    assert_eq!(report.files_extracted, 2);
    assert_eq!(report.files_out_of_scope, 2);
    assert!(report.bytes_written >= 2);
    assert_eq!(extracted_files(&dest), vec!["a.txt", "sub/b.txt"]);
}

#[test]
fn test_extract_overwrites_existing_files() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let path = archive_with(temp.path(), &[("a.txt", "fresh")]);
    let dest = temp.path().join("dest");
    populate(&dest, &[("a.txt", "stale content")]);

    let mut manager = ArchiveManager::new();
    manager
        .make(&path, CodecKind::Zip)
        .unwrap()
        .extract_to(&dest, &[] as &[&str], ExtractMode::BLACKLIST)
        .unwrap();

    assert_eq!(fs::read_to_string(dest.join("a.txt")).unwrap(), "fresh");
}

#[test]
fn test_extract_matching_regex() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let path = archive_with(
        temp.path(),
        &[("foo/a.txt", "a"), ("foo/b.log", "b"), ("c.txt", "c")],
    );

    let mut manager = ArchiveManager::new();
    manager.make(&path, CodecKind::Zip).unwrap();

    let dest = temp.path().join("regex");
    let report = manager
        .folder("foo")
        .extract_matching_regex(&dest, r"/\.txt$/")
        .unwrap();

    assert_eq!(report.files_extracted, 1);
    assert_eq!(extracted_files(&dest), vec!["a.txt"]);
}

#[test]
fn test_extract_matching_invalid_regex_names_entry() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let path = archive_with(temp.path(), &[("first.txt", "1"), ("second.txt", "2")]);

    let mut manager = ArchiveManager::new();
    manager.make(&path, CodecKind::Zip).unwrap();

    let err = manager
        .extract_matching_regex(temp.path().join("out"), "/[unclosed/")
        .unwrap_err();
    assert_eq!(err.entry_name(), Some("first.txt"));
    assert!(err.to_string().contains("first.txt"));
}

#[test]
fn test_delete_removes_archive_file() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let path = archive_with(temp.path(), &[("a.txt", "a")]);

    let mut manager = ArchiveManager::new();
    manager.make(&path, CodecKind::Zip).unwrap();
    manager.delete().unwrap();

    assert!(!path.exists());
    assert!(manager.codec().is_none());
    assert_eq!(manager.file_path(), Path::new(""));
}

#[test]
fn test_add_missing_path_fails() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let mut manager = ArchiveManager::with_config(ArchiveConfig::stored());
    manager
        .make(temp.path().join("a.zip"), CodecKind::Zip)
        .unwrap()
        .add_as(temp.path().join("ghost.txt"), "ghost.txt")
        .unwrap_err();

    assert_eq!(manager.status().unwrap(), "No error");
}
