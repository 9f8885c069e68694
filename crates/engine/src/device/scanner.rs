// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-device scanner ("sniffer").
//!
//! One task per active device. Phase one is a filtered recursive walk
//! that feeds every directory and matching file into the scheduler;
//! directories go too, so destination structure is created in priority
//! order. Phase two follows filesystem-change notifications: events bump
//! a counter and, at the threshold, trigger copies for the changed path.
//! A companion interval zeroes the counter so transient bursts do not
//! linger.

use crate::bus::EventBus;
use crate::copy::{CopyContext, CopyTask};
use crate::device::filter::{BasicFileFilter, SuffixFilter};
use crate::device::lifecycle::ExitReason;
use crate::scheduler::PriorityScheduler;
use parking_lot::Mutex;
use pk_adapters::{attrs, DirectoryWatcher, WatchEvent, WatchKind};
use pk_core::{priority_for, ConfigHandle, DeviceHandle, Event};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

/// Everything a scanner needs, cloned per device.
#[derive(Clone)]
pub struct ScannerContext {
    pub device: DeviceHandle,
    pub config: ConfigHandle,
    pub scheduler: Arc<PriorityScheduler>,
    pub copy_ctx: Arc<CopyContext>,
    pub bus: Arc<EventBus>,
}

/// Running scanner owned by the device manager's registry.
pub struct ScannerHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
    exit: Arc<Mutex<Option<ExitReason>>>,
}

impl ScannerHandle {
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Exit reason, once the scanner has finished.
    pub fn exit_reason(&self) -> Option<ExitReason> {
        *self.exit.lock()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel and wait for the scanner task to end.
    pub async fn stop(self) -> Option<ExitReason> {
        self.cancel.cancel();
        let _ = self.join.await;
        *self.exit.lock()
    }
}

/// Start a scanner task for one device.
pub fn spawn_scanner(ctx: ScannerContext) -> ScannerHandle {
    let cancel = CancellationToken::new();
    let exit = Arc::new(Mutex::new(None));

    let task_cancel = cancel.clone();
    let task_exit = Arc::clone(&exit);
    let join = tokio::spawn(async move {
        let serial = ctx.device.serial.clone();
        let reason = match scan_device(&ctx, &task_cancel).await {
            Ok(reason) => reason,
            Err(e) => {
                tracing::warn!(%serial, error = %e, "scanner failed");
                ExitReason::Error
            }
        };
        tracing::info!(%serial, ?reason, "scanner finished");
        *task_exit.lock() = Some(reason);
    });

    ScannerHandle { cancel, join, exit }
}

struct ScanEntry {
    path: PathBuf,
    is_dir: bool,
    size: u64,
}

async fn scan_device(
    ctx: &ScannerContext,
    cancel: &CancellationToken,
) -> Result<ExitReason, crate::error::EngineError> {
    let root = ctx.device.root.clone();
    tracing::info!(serial = %ctx.device.serial, root = %root.display(), "initial scan starting");

    let entries = walk_filtered(ctx, root.clone(), cancel).await?;
    let dirs = submit_entries(ctx, entries);

    if cancel.is_cancelled() {
        // Interrupted before monitoring starts.
        return Ok(ExitReason::NormalCompletion);
    }
    if !ctx.config.scanner.watch_enabled {
        return Ok(ExitReason::NormalCompletion);
    }

    watch_device(ctx, cancel, &root, dirs).await
}

/// Filtered recursive walk, run off the async workers.
async fn walk_filtered(
    ctx: &ScannerContext,
    root: PathBuf,
    cancel: &CancellationToken,
) -> Result<Vec<ScanEntry>, crate::error::EngineError> {
    let basic = BasicFileFilter::from_config(&ctx.config.filter, &ctx.config.scanner);
    let suffix = SuffixFilter::from_config(&ctx.config.suffix_filter);
    let walk_cancel = cancel.clone();

    let entries = tokio::task::spawn_blocking(move || {
        let mut entries = Vec::new();
        // The root itself (depth 0) is never subject to the hidden-dir
        // policy; only descendants are filtered.
        let walker = WalkDir::new(&root)
            .follow_links(basic.follow_symlinks())
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || basic.accept_dir(entry.path())
            });
        for entry in walker {
            if walk_cancel.is_cancelled() {
                break;
            }
            let Ok(entry) = entry else { continue };
            if entry.path() == root {
                continue;
            }
            if entry.file_type().is_dir() {
                entries.push(ScanEntry {
                    path: entry.into_path(),
                    is_dir: true,
                    size: 0,
                });
                continue;
            }
            let Ok(meta) = entry.metadata() else { continue };
            if basic.accept_file(entry.path(), &meta) && suffix.accept(entry.path()) {
                entries.push(ScanEntry {
                    path: entry.into_path(),
                    is_dir: false,
                    size: meta.len(),
                });
            }
        }
        entries
    })
    .await?;

    Ok(entries)
}

/// Queue every entry; returns the directories for watch registration.
fn submit_entries(ctx: &ScannerContext, entries: Vec<ScanEntry>) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    for entry in entries {
        if entry.is_dir {
            dirs.push(entry.path.clone());
        } else {
            ctx.bus.dispatch(&Event::FileDiscovered {
                path: entry.path.clone(),
                size: entry.size,
                serial: ctx.device.serial.clone(),
            });
        }
        let priority = priority_for(entry.is_dir, &entry.path, entry.size) as i32;
        let task = CopyTask::new(entry.path, ctx.device.clone(), Arc::clone(&ctx.copy_ctx));
        if let Err(e) = ctx.scheduler.submit(priority, task) {
            tracing::warn!(serial = %ctx.device.serial, error = %e, "dropping scan entry");
        }
    }
    dirs
}

/// Phase two: follow change notifications until cancelled or closed.
async fn watch_device(
    ctx: &ScannerContext,
    cancel: &CancellationToken,
    root: &Path,
    dirs: Vec<PathBuf>,
) -> Result<ExitReason, crate::error::EngineError> {
    let (mut watcher, rx) = match DirectoryWatcher::new() {
        Ok(pair) => pair,
        Err(e) => {
            tracing::warn!(serial = %ctx.device.serial, error = %e, "watcher unavailable");
            return Ok(ExitReason::Error);
        }
    };
    if watcher.watch_dir(root).is_err() {
        // Root vanished between scan and watch.
        return Ok(ExitReason::NormalCompletion);
    }
    for dir in dirs {
        if let Err(e) = watcher.watch_dir(&dir) {
            tracing::debug!(dir = %dir.display(), error = %e, "directory watch failed");
        }
    }
    tracing::info!(
        serial = %ctx.device.serial,
        watched = watcher.watched_count(),
        "watch phase started"
    );

    watch_loop(ctx, cancel, &mut watcher, rx).await
}

async fn watch_loop(
    ctx: &ScannerContext,
    cancel: &CancellationToken,
    watcher: &mut DirectoryWatcher,
    mut rx: mpsc::Receiver<WatchEvent>,
) -> Result<ExitReason, crate::error::EngineError> {
    let include_hidden = ctx.config.filter.include_hidden;
    let threshold = ctx.config.scanner.watch_threshold.max(1);
    let reset_every = Duration::from_secs(ctx.config.scanner.watch_reset_interval_seconds.max(1));

    let mut counter: u32 = 0;
    let mut reset = tokio::time::interval(reset_every);
    reset.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    reset.tick().await; // first tick fires immediately; skip it

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(ExitReason::NormalCompletion),

            _ = reset.tick() => {
                counter = 0;
            }

            event = rx.recv() => {
                let Some(event) = event else {
                    // Watcher backend closed its stream.
                    return Ok(ExitReason::NormalCompletion);
                };
                if event.kind == WatchKind::Overflow {
                    tracing::debug!(serial = %ctx.device.serial, "watch overflow, events missed");
                    continue;
                }
                let Some(path) = event.path else { continue };
                if !path.exists() {
                    // Vanished before we got to look at it.
                    continue;
                }
                if !include_hidden && attrs::is_hidden(&path) {
                    continue;
                }
                counter += 1;
                if counter >= threshold {
                    counter = 0;
                    trigger_copies(ctx, cancel, watcher, &path).await?;
                }
            }
        }
    }
}

/// Threshold crossed: mirror the changed path.
async fn trigger_copies(
    ctx: &ScannerContext,
    cancel: &CancellationToken,
    watcher: &mut DirectoryWatcher,
    path: &Path,
) -> Result<(), crate::error::EngineError> {
    if path.is_dir() {
        // New directory: watch it and mirror its whole subtree.
        if let Err(e) = watcher.watch_dir(path) {
            tracing::debug!(dir = %path.display(), error = %e, "new directory watch failed");
        }
        let entries = walk_filtered(ctx, path.to_path_buf(), cancel).await?;
        let new_dirs = submit_entries(ctx, entries);
        for dir in new_dirs {
            let _ = watcher.watch_dir(&dir);
        }
        return Ok(());
    }

    let Ok(meta) = std::fs::metadata(path) else {
        return Ok(());
    };
    let basic = BasicFileFilter::from_config(&ctx.config.filter, &ctx.config.scanner);
    let suffix = SuffixFilter::from_config(&ctx.config.suffix_filter);
    if !basic.accept_file(path, &meta) || !suffix.accept(path) {
        return Ok(());
    }

    ctx.bus.dispatch(&Event::FileDiscovered {
        path: path.to_path_buf(),
        size: meta.len(),
        serial: ctx.device.serial.clone(),
    });
    let priority = priority_for(false, path, meta.len()) as i32;
    let task = CopyTask::new(
        path.to_path_buf(),
        ctx.device.clone(),
        Arc::clone(&ctx.copy_ctx),
    );
    if let Err(e) = ctx.scheduler.submit(priority, task) {
        tracing::warn!(serial = %ctx.device.serial, error = %e, "dropping watched file");
    }
    Ok(())
}

#[cfg(test)]
#[path = "scanner_tests.rs"]
mod tests;
