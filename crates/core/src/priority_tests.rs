// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use yare::parameterized;

const MIB: u64 = 1024 * 1024;

#[test]
fn directories_outrank_typical_files() {
    let dir = priority_for(true, Path::new("E:/photos"), 0);
    let pdf = priority_for(false, Path::new("E:/a.pdf"), 5 * MIB);
    assert_eq!(dir, DIRECTORY_PRIORITY);
    assert!(dir > pdf);
}

#[parameterized(
    pdf = { "report.pdf", 10 },
    docx = { "letter.docx", 9 },
    xlsx = { "sheet.xlsx", 9 },
    pptx = { "deck.pptx", 8 },
    txt = { "notes.txt", 7 },
    jpg = { "photo.jpg", 6 },
    png = { "shot.PNG", 6 },
    mp4 = { "clip.mp4", 5 },
    unknown = { "blob.xyz", 5 },
    no_extension = { "README", 5 },
)]
fn extension_table(name: &str, base: u8) {
    // Mid-size file: no size adjustment applies.
    let priority = priority_for(false, Path::new(name), 5 * MIB);
    assert_eq!(priority, base);
}

#[test]
fn small_files_are_favored() {
    let small = priority_for(false, Path::new("a.txt"), MIB - 1);
    let mid = priority_for(false, Path::new("a.txt"), MIB);
    assert_eq!(small, mid + 2);
}

#[test]
fn large_files_are_deferred() {
    let large = priority_for(false, Path::new("a.pdf"), 10 * MIB);
    let mid = priority_for(false, Path::new("a.pdf"), 9 * MIB);
    assert_eq!(large, mid - 4);
}

#[test]
fn penalty_saturates_at_zero() {
    // mp4 base 5, minus 4 for size, stays within range.
    let priority = priority_for(false, Path::new("movie.mp4"), 100 * MIB);
    assert_eq!(priority, 1);
}

proptest! {
    #[test]
    fn priority_is_always_in_range(
        name in "[a-z]{1,8}(\\.[a-z0-9]{1,4})?",
        size in 0u64..u64::MAX / 2,
        is_dir: bool,
    ) {
        let priority = priority_for(is_dir, Path::new(&name), size);
        prop_assert!(priority <= 100);
    }
}
