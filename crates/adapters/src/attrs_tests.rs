// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::{Duration, SystemTime};

#[test]
fn copy_file_times_preserves_mtime() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src.txt");
    let dest = dir.path().join("dest.txt");
    std::fs::write(&src, b"a").unwrap();
    std::fs::write(&dest, b"a").unwrap();

    let old = SystemTime::now() - Duration::from_secs(3600);
    filetime::set_file_mtime(&src, FileTime::from_system_time(old)).unwrap();

    copy_file_times(&src, &dest).unwrap();

    let src_mtime = std::fs::metadata(&src).unwrap().modified().unwrap();
    let dest_mtime = std::fs::metadata(&dest).unwrap().modified().unwrap();
    assert_eq!(src_mtime, dest_mtime);
}

#[test]
fn copy_readonly_transfers_the_bit() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src.txt");
    let dest = dir.path().join("dest.txt");
    std::fs::write(&src, b"a").unwrap();
    std::fs::write(&dest, b"a").unwrap();

    let mut perms = std::fs::metadata(&src).unwrap().permissions();
    perms.set_readonly(true);
    std::fs::set_permissions(&src, perms).unwrap();

    copy_readonly(&src, &dest).unwrap();
    assert!(std::fs::metadata(&dest).unwrap().permissions().readonly());

    // Restore so the tempdir can be removed on every platform.
    for path in [&src, &dest] {
        let mut perms = std::fs::metadata(path).unwrap().permissions();
        #[allow(clippy::permissions_set_readonly_false)]
        perms.set_readonly(false);
        std::fs::set_permissions(path, perms).unwrap();
    }
}

#[test]
fn writable_source_leaves_dest_writable() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src.txt");
    let dest = dir.path().join("dest.txt");
    std::fs::write(&src, b"a").unwrap();
    std::fs::write(&dest, b"a").unwrap();

    copy_readonly(&src, &dest).unwrap();
    assert!(!std::fs::metadata(&dest).unwrap().permissions().readonly());
}

#[cfg(not(windows))]
#[test]
fn dot_files_are_hidden() {
    assert!(is_hidden(Path::new("/tmp/.secret")));
    assert!(!is_hidden(Path::new("/tmp/visible.txt")));
}
