// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recycler service: empty-directory upkeep and pressure-driven deletion.
//!
//! Under Ok storage the work tree is swept for empty directories. Under
//! pressure, candidate files are collected and deleted by the effective
//! strategy (oldest first at Low, largest first at Critical), never
//! touching protected files.

use crate::bus::EventBus;
use crate::error::EngineError;
use crate::service::Service;
use async_trait::async_trait;
use pk_core::{ConfigHandle, Event, RecycleStrategy, StorageLevel};
use pk_storage::{recycler, StorageController};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Periodic service keeping the work volume within bounds.
pub struct RecyclerService {
    storage: Arc<StorageController>,
    bus: Arc<EventBus>,
    config: ConfigHandle,
}

impl RecyclerService {
    pub fn new(storage: Arc<StorageController>, bus: Arc<EventBus>, config: ConfigHandle) -> Self {
        Self {
            storage,
            bus,
            config,
        }
    }

    /// Strategy actually applied at a given level.
    fn effective_strategy(configured: RecycleStrategy, level: StorageLevel) -> RecycleStrategy {
        match configured {
            RecycleStrategy::Auto => match level {
                StorageLevel::Critical => RecycleStrategy::SizeFirst,
                _ => RecycleStrategy::TimeFirst,
            },
            fixed => fixed,
        }
    }

    async fn sweep_empty_dirs(&self) -> Result<(), EngineError> {
        let work = self.storage.work_path().to_path_buf();
        let empties = tokio::task::spawn_blocking(move || {
            let empties = recycler::find_empty_dirs(&work);
            let mut deleted = Vec::new();
            for dir in empties {
                match std::fs::remove_dir(&dir) {
                    Ok(()) => deleted.push(dir),
                    Err(e) => {
                        tracing::debug!(dir = %dir.display(), error = %e, "empty dir removal failed");
                    }
                }
            }
            deleted
        })
        .await?;

        if !empties.is_empty() {
            tracing::info!(count = empties.len(), "removed empty directories");
            self.bus.dispatch(&Event::EmptyFoldersDeleted {
                count: empties.len(),
                folders: empties,
            });
        }
        Ok(())
    }

    async fn recycle_files(&self, level: StorageLevel) -> Result<(), EngineError> {
        let strategy = Self::effective_strategy(self.config.recycler.strategy, level);
        let work = self.storage.work_path().to_path_buf();
        let protected_age =
            Duration::from_secs(self.config.recycler.protected_age_hours * 3600);

        let (deleted, bytes_freed): (Vec<PathBuf>, u64) =
            tokio::task::spawn_blocking(move || {
                let candidates =
                    recycler::collect_candidates(&work, protected_age, SystemTime::now());
                let total_scanned: u64 = candidates.iter().map(|c| c.size).sum();
                let needed = recycler::bytes_needed(total_scanned);
                let selected = match strategy {
                    RecycleStrategy::SizeFirst => recycler::select_by_size(&candidates, needed),
                    _ => recycler::select_by_time(&candidates, needed),
                };
                recycler::delete_files(&selected)
            })
            .await?;

        if !deleted.is_empty() {
            tracing::info!(
                files = deleted.len(),
                bytes_freed,
                %strategy,
                "recycled files under storage pressure"
            );
            self.bus.dispatch(&Event::FilesRecycled {
                paths: deleted,
                bytes_freed,
                strategy,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Service for RecyclerService {
    fn name(&self) -> &'static str {
        "recycler"
    }

    fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.config.recycler.tick_minutes * 60)
    }

    async fn tick(&self) -> Result<(), EngineError> {
        let status = self.storage.status();
        match status.level {
            StorageLevel::Ok => self.sweep_empty_dirs().await,
            level => self.recycle_files(level).await,
        }
    }
}

#[cfg(test)]
#[path = "recycler_tests.rs"]
mod tests;
