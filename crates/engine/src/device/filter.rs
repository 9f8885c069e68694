// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scan-time file acceptance.
//!
//! [`BasicFileFilter`] applies the structural policy (regular file,
//! non-empty, size cap, hidden handling, optional modified-time range);
//! [`SuffixFilter`] applies the extension policy on top.

use pk_adapters::attrs;
use pk_core::config::{FilterConfig, ScannerConfig, SuffixFilterConfig, SuffixMode};
use std::collections::HashSet;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Structural acceptance policy for scanned entries.
#[derive(Debug, Clone)]
pub struct BasicFileFilter {
    max_file_size: u64,
    include_hidden: bool,
    follow_symlinks: bool,
    modified_after: Option<SystemTime>,
    modified_before: Option<SystemTime>,
}

impl BasicFileFilter {
    pub fn from_config(filter: &FilterConfig, scanner: &ScannerConfig) -> Self {
        let to_time = |secs: u64| UNIX_EPOCH + Duration::from_secs(secs);
        Self {
            max_file_size: scanner.max_file_size,
            include_hidden: filter.include_hidden,
            follow_symlinks: filter.follow_symlinks,
            modified_after: filter.modified_after.map(to_time),
            modified_before: filter.modified_before.map(to_time),
        }
    }

    pub fn follow_symlinks(&self) -> bool {
        self.follow_symlinks
    }

    /// Whether a directory may be descended into.
    pub fn accept_dir(&self, path: &Path) -> bool {
        self.include_hidden || !attrs::is_hidden(path)
    }

    /// Whether a file is worth mirroring.
    pub fn accept_file(&self, path: &Path, meta: &std::fs::Metadata) -> bool {
        if !meta.is_file() {
            return false;
        }
        let size = meta.len();
        if size == 0 || size > self.max_file_size {
            return false;
        }
        if !self.include_hidden && attrs::is_hidden(path) {
            return false;
        }
        if self.modified_after.is_some() || self.modified_before.is_some() {
            // Unreadable mtime with a configured range: reject rather than
            // guess.
            let Ok(modified) = meta.modified() else {
                return false;
            };
            if let Some(after) = self.modified_after {
                if modified < after {
                    return false;
                }
            }
            if let Some(before) = self.modified_before {
                if modified > before {
                    return false;
                }
            }
        }
        true
    }
}

/// Extension acceptance policy.
#[derive(Debug, Clone)]
pub struct SuffixFilter {
    mode: SuffixMode,
    suffixes: HashSet<String>,
}

impl SuffixFilter {
    pub fn from_config(config: &SuffixFilterConfig) -> Self {
        Self {
            mode: config.mode,
            suffixes: config
                .suffixes
                .iter()
                .map(|s| s.to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn accept(&self, path: &Path) -> bool {
        if self.mode == SuffixMode::None {
            return true;
        }
        let listed = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| self.suffixes.contains(&e.to_ascii_lowercase()))
            .unwrap_or(false);
        match self.mode {
            SuffixMode::None => true,
            SuffixMode::Whitelist => listed,
            SuffixMode::Blacklist => !listed,
        }
    }
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
