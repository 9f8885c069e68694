// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Duplicate-detection index collaborator contract.
//!
//! The real index lives outside the core engine; the copy path only needs
//! `check_duplicate` before writing and `add_file` after. [`MemoryIndex`]
//! is the in-process implementation the daemon wires by default.

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Content-hash index mapping `hash → (path, size)`.
pub trait FileIndex: Send + Sync {
    /// Whether a file with this content hash is already mirrored.
    fn check_duplicate(&self, path: &Path, hash: &str) -> bool;

    /// Record a mirrored file.
    fn add_file(&self, hash: &str, path: &Path, size: u64);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub path: PathBuf,
    pub size: u64,
}

/// In-memory index.
#[derive(Default)]
pub struct MemoryIndex {
    entries: Mutex<HashMap<String, IndexEntry>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl FileIndex for MemoryIndex {
    fn check_duplicate(&self, _path: &Path, hash: &str) -> bool {
        self.entries.lock().contains_key(hash)
    }

    fn add_file(&self, hash: &str, path: &Path, size: u64) {
        self.entries.lock().insert(
            hash.to_string(),
            IndexEntry {
                path: path.to_path_buf(),
                size,
            },
        );
    }
}

/// Streaming SHA-256 of a file, lowercase hex.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
#[path = "index_tests.rs"]
mod tests;
