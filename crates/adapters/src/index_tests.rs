// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn memory_index_records_and_finds_hashes() {
    let index = MemoryIndex::new();
    assert!(!index.check_duplicate(Path::new("/a"), "h1"));

    index.add_file("h1", Path::new("/a"), 10);
    assert!(index.check_duplicate(Path::new("/a"), "h1"));
    // Duplicate detection is by content, not by path.
    assert!(index.check_duplicate(Path::new("/elsewhere"), "h1"));
    assert_eq!(index.len(), 1);
}

#[test]
fn hash_file_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("f.txt");
    std::fs::write(&path, b"packrat").unwrap();

    let a = hash_file(&path).unwrap();
    let b = hash_file(&path).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 64);
}

#[test]
fn hash_file_differs_on_content() {
    let dir = tempfile::tempdir().unwrap();
    let one = dir.path().join("one");
    let two = dir.path().join("two");
    std::fs::write(&one, b"aaa").unwrap();
    std::fs::write(&two, b"bbb").unwrap();

    assert_ne!(hash_file(&one).unwrap(), hash_file(&two).unwrap());
}

#[test]
fn hash_file_missing_file_is_an_error() {
    assert!(hash_file(Path::new("/does/not/exist")).is_err());
}
