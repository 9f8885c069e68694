// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recycling mechanics: candidate collection, protection rules, selection
//! strategies, and the empty-directory sweep.
//!
//! Protection is fail-safe: any error while checking a file treats it as
//! protected. Deletion is best-effort with failures logged.

use fs2::FileExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use walkdir::WalkDir;

/// Files examined per recycling pass.
pub const MAX_CANDIDATES_PER_PASS: usize = 50;

/// Empty directories removed per sweep.
pub const MAX_EMPTY_DIRS_PER_PASS: usize = 100;

/// Floor for the reclaim target.
pub const MIN_RECLAIM_BYTES: u64 = 1024 * 1024;

/// Metadata collected for one recycling candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub path: PathBuf,
    pub size: u64,
    /// Modification time of the mirrored copy.
    pub copy_time: SystemTime,
    pub protected: bool,
}

/// Reclaim target: a tenth of the scanned bytes, at least 1 MiB.
pub fn bytes_needed(total_scanned: u64) -> u64 {
    (total_scanned / 10).max(MIN_RECLAIM_BYTES)
}

/// Walk the work tree collecting up to [`MAX_CANDIDATES_PER_PASS`] files.
pub fn collect_candidates(work: &Path, protected_age: Duration, now: SystemTime) -> Vec<FileMeta> {
    WalkDir::new(work)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .take(MAX_CANDIDATES_PER_PASS)
        .map(|entry| {
            let path = entry.path().to_path_buf();
            match entry.metadata() {
                Ok(meta) => {
                    let copy_time = meta.modified().unwrap_or(now);
                    let protected = is_new(copy_time, now, protected_age)
                        || is_locked(&path)
                        || is_system(&path);
                    FileMeta {
                        path,
                        size: meta.len(),
                        copy_time,
                        protected,
                    }
                }
                // Unreadable metadata: keep the entry but never delete it.
                Err(_) => FileMeta {
                    path,
                    size: 0,
                    copy_time: now,
                    protected: true,
                },
            }
        })
        .collect()
}

/// Oldest copies first until the target is met. Protected files are never
/// chosen; a zero target selects nothing.
pub fn select_by_time(files: &[FileMeta], bytes_needed: u64) -> Vec<FileMeta> {
    let mut candidates: Vec<&FileMeta> = files.iter().filter(|f| !f.protected).collect();
    candidates.sort_by_key(|f| f.copy_time);
    accumulate(candidates, bytes_needed)
}

/// Largest files first until the target is met.
pub fn select_by_size(files: &[FileMeta], bytes_needed: u64) -> Vec<FileMeta> {
    let mut candidates: Vec<&FileMeta> = files.iter().filter(|f| !f.protected).collect();
    candidates.sort_by(|a, b| b.size.cmp(&a.size));
    accumulate(candidates, bytes_needed)
}

fn accumulate(candidates: Vec<&FileMeta>, bytes_needed: u64) -> Vec<FileMeta> {
    let mut selected = Vec::new();
    let mut accumulated = 0u64;
    for file in candidates {
        if accumulated >= bytes_needed {
            break;
        }
        accumulated += file.size;
        selected.push(file.clone());
    }
    selected
}

/// Strictly-under-age check: a file exactly `age` old is not new.
fn is_new(copy_time: SystemTime, now: SystemTime, age: Duration) -> bool {
    match now.duration_since(copy_time) {
        Ok(elapsed) => elapsed < age,
        // Future mtime: treat as new.
        Err(_) => true,
    }
}

/// Whether an exclusive lock cannot be obtained right now.
pub fn is_locked(path: &Path) -> bool {
    let Ok(file) = std::fs::File::open(path) else {
        return true;
    };
    match file.try_lock_exclusive() {
        Ok(()) => {
            let _ = fs2::FileExt::unlock(&file);
            false
        }
        Err(_) => true,
    }
}

const SYSTEM_MARKERS: [&str; 4] = [
    "\\windows\\",
    "\\program files",
    "\\program files (x86)",
    "\\programdata",
];

/// Hidden files and well-known Windows system locations.
pub fn is_system(path: &Path) -> bool {
    if path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
    {
        return true;
    }
    if has_hidden_attribute(path) {
        return true;
    }
    let lower = path.to_string_lossy().to_ascii_lowercase();
    SYSTEM_MARKERS.iter().any(|marker| lower.contains(marker))
}

#[cfg(windows)]
fn has_hidden_attribute(path: &Path) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    // A vanished candidate is handled by the best-effort delete, not here.
    std::fs::metadata(path)
        .map(|meta| meta.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0)
        .unwrap_or(false)
}

#[cfg(not(windows))]
fn has_hidden_attribute(_path: &Path) -> bool {
    false
}

/// Empty directories under `work`, deepest first, excluding the root.
pub fn find_empty_dirs(work: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = WalkDir::new(work)
        .min_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.into_path())
        .filter(|dir| {
            std::fs::read_dir(dir)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false)
        })
        .collect();
    dirs.sort_by_key(|dir| std::cmp::Reverse(dir.components().count()));
    dirs.truncate(MAX_EMPTY_DIRS_PER_PASS);
    dirs
}

/// Delete the selection best-effort. Returns deleted paths and bytes freed.
pub fn delete_files(selected: &[FileMeta]) -> (Vec<PathBuf>, u64) {
    let mut deleted = Vec::new();
    let mut bytes_freed = 0u64;
    for file in selected {
        match std::fs::remove_file(&file.path) {
            Ok(()) => {
                bytes_freed += file.size;
                deleted.push(file.path.clone());
            }
            Err(e) => {
                tracing::warn!(path = %file.path.display(), error = %e, "recycle delete failed");
            }
        }
    }
    (deleted, bytes_freed)
}

#[cfg(test)]
#[path = "recycler_tests.rs"]
mod tests;
