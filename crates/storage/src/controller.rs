// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thresholded view of free space on the work volume.
//!
//! The controller is stateless: every call probes the volume. Probe
//! failures are reported as the conservative `(0, 0, 0, Critical)` so a
//! broken work volume halts copying instead of filling the disk.

use pk_core::{StorageLevel, StorageStatus};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Source of `(free, total)` byte counts for a path's volume.
pub trait SpaceProbe: Send + Sync {
    fn space(&self, path: &Path) -> std::io::Result<(u64, u64)>;
}

/// Real probe backed by `fs2`.
#[derive(Default)]
pub struct Fs2Probe;

impl SpaceProbe for Fs2Probe {
    fn space(&self, path: &Path) -> std::io::Result<(u64, u64)> {
        Ok((fs2::available_space(path)?, fs2::total_space(path)?))
    }
}

/// Read-only storage view for the configured work directory.
pub struct StorageController {
    work_path: PathBuf,
    reserved_bytes: u64,
    probe: Arc<dyn SpaceProbe>,
}

impl StorageController {
    pub fn new(work_path: PathBuf, reserved_bytes: u64) -> Self {
        Self::with_probe(work_path, reserved_bytes, Arc::new(Fs2Probe))
    }

    pub fn with_probe(
        work_path: PathBuf,
        reserved_bytes: u64,
        probe: Arc<dyn SpaceProbe>,
    ) -> Self {
        Self {
            work_path,
            reserved_bytes,
            probe,
        }
    }

    pub fn work_path(&self) -> &Path {
        &self.work_path
    }

    pub fn reserved_bytes(&self) -> u64 {
        self.reserved_bytes
    }

    /// Probe the work volume now.
    pub fn status(&self) -> StorageStatus {
        match self.probe.space(&self.work_path) {
            Ok((free, total)) => StorageStatus::new(free, total, self.reserved_bytes),
            Err(e) => {
                tracing::warn!(
                    work_path = %self.work_path.display(),
                    error = %e,
                    "storage probe failed, reporting critical"
                );
                StorageStatus::unavailable()
            }
        }
    }

    pub fn level(&self) -> StorageLevel {
        self.status().level
    }

    pub fn is_critical(&self) -> bool {
        self.status().is_critical()
    }
}

/// Controllable probe for tests.
#[cfg(any(test, feature = "test-support"))]
pub struct FakeProbe {
    free: std::sync::atomic::AtomicU64,
    total: std::sync::atomic::AtomicU64,
    failing: std::sync::atomic::AtomicBool,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeProbe {
    pub fn new(free: u64, total: u64) -> Self {
        Self {
            free: free.into(),
            total: total.into(),
            failing: false.into(),
        }
    }

    pub fn set_free(&self, free: u64) {
        self.free.store(free, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(any(test, feature = "test-support"))]
impl SpaceProbe for FakeProbe {
    fn space(&self, _path: &Path) -> std::io::Result<(u64, u64)> {
        use std::sync::atomic::Ordering;
        if self.failing.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("probe offline"));
        }
        Ok((self.free.load(Ordering::SeqCst), self.total.load(Ordering::SeqCst)))
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
