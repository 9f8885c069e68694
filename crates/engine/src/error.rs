// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error type

use thiserror::Error;

/// Errors surfaced by engine components.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("scheduler queue is full ({0} tasks)")]
    SchedulerFull(usize),
    #[error("watch error: {0}")]
    Watch(#[from] pk_adapters::WatchError),
    #[error("volume error: {0}")]
    Volume(#[from] pk_adapters::VolumeError),
    #[error("record store error: {0}")]
    Store(#[from] pk_storage::StoreError),
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
