// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure priority rule: path and size to an urgency in `[0, 100]`.
//!
//! Directories outrank most files so destination structure exists before
//! contents arrive. Small files are favored, large files deferred.

use std::path::Path;

/// Priority assigned to directories.
pub const DIRECTORY_PRIORITY: u8 = 11;

/// Base priority for files with an unknown extension.
pub const DEFAULT_PRIORITY: u8 = 5;

const SMALL_FILE_BYTES: u64 = 1024 * 1024;
const LARGE_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Favor applied to files under 1 MiB.
const SMALL_FILE_BONUS: i32 = 2;
/// Deferral applied to files of 10 MiB and above.
const LARGE_FILE_PENALTY: i32 = 4;

fn extension_base(path: &Path) -> i32 {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => 10,
        Some("doc" | "docx") => 9,
        Some("xls" | "xlsx") => 9,
        Some("ppt" | "pptx") => 8,
        Some("txt") => 7,
        Some("jpg" | "jpeg" | "png") => 6,
        Some("mp4" | "mp3") => 5,
        _ => DEFAULT_PRIORITY as i32,
    }
}

/// Compute the scheduling priority for an entry.
pub fn priority_for(is_dir: bool, path: &Path, size: u64) -> u8 {
    if is_dir {
        return DIRECTORY_PRIORITY;
    }
    let mut priority = extension_base(path);
    if size < SMALL_FILE_BYTES {
        priority += SMALL_FILE_BONUS;
    } else if size >= LARGE_FILE_BYTES {
        priority -= LARGE_FILE_PENALTY;
    }
    priority.clamp(0, 100) as u8
}

#[cfg(test)]
#[path = "priority_tests.rs"]
mod tests;
