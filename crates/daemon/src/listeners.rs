// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event-bus listeners the daemon registers at startup.

use pk_core::{CopyResult, Event};
use pk_engine::{EventListener, ListenerError};
use std::sync::atomic::{AtomicU64, Ordering};

/// Logs every event with structured fields.
pub struct LogListener;

impl EventListener for LogListener {
    fn name(&self) -> &str {
        "log"
    }

    fn on_event(&self, event: &Event) -> Result<(), ListenerError> {
        match event {
            Event::NewDeviceJoined {
                serial,
                volume_name,
            } => {
                tracing::info!(%serial, volume_name, "new device joined");
            }
            Event::DeviceInserted { serial, root } => {
                tracing::info!(%serial, root = %root.display(), "device inserted");
            }
            Event::DeviceRemoved { serial } => {
                tracing::info!(%serial, "device removed");
            }
            Event::DeviceStateChanged { serial, old, new } => {
                tracing::debug!(%serial, %old, %new, "device state changed");
            }
            Event::FileDiscovered { path, size, serial } => {
                tracing::debug!(%serial, path = %path.display(), size, "file discovered");
            }
            Event::CopyCompleted {
                source,
                result,
                bytes_copied,
                serial,
                ..
            } => {
                tracing::debug!(
                    %serial,
                    source = %source.display(),
                    %result,
                    bytes_copied,
                    "copy completed"
                );
            }
            Event::StorageLow {
                free_bytes, level, ..
            } => {
                tracing::warn!(free_bytes, %level, "storage pressure");
            }
            Event::StorageRecovered { free_bytes, .. } => {
                tracing::info!(free_bytes, "storage recovered");
            }
            Event::FilesRecycled {
                paths,
                bytes_freed,
                strategy,
            } => {
                tracing::info!(files = paths.len(), bytes_freed, %strategy, "files recycled");
            }
            Event::EmptyFoldersDeleted { count, .. } => {
                tracing::info!(count, "empty folders deleted");
            }
        }
        Ok(())
    }
}

/// Aggregate copy counters, reported at shutdown.
#[derive(Default)]
pub struct StatsListener {
    copied: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    bytes: AtomicU64,
}

impl StatsListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(&self) -> String {
        format!(
            "copied={} skipped={} failed={} cancelled={} bytes={}",
            self.copied.load(Ordering::Relaxed),
            self.skipped.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
            self.cancelled.load(Ordering::Relaxed),
            self.bytes.load(Ordering::Relaxed),
        )
    }
}

impl EventListener for StatsListener {
    fn name(&self) -> &str {
        "stats"
    }

    fn on_event(&self, event: &Event) -> Result<(), ListenerError> {
        if let Event::CopyCompleted {
            result,
            bytes_copied,
            ..
        } = event
        {
            let counter = match result {
                CopyResult::Success => &self.copied,
                CopyResult::Skipped => &self.skipped,
                CopyResult::Fail => &self.failed,
                CopyResult::Cancel => &self.cancelled,
            };
            counter.fetch_add(1, Ordering::Relaxed);
            self.bytes.fetch_add(*bytes_copied, Ordering::Relaxed);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "listeners_tests.rs"]
mod tests;
