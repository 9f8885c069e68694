// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events published by the core engine.
//!
//! Serializes with `{"type": "area:name", ...fields}` format.

use crate::copy::CopyResult;
use crate::device::DeviceState;
use crate::id::DeviceSerial;
use crate::storage_status::{RecycleStrategy, StorageLevel};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Immutable records dispatched through the [`crate::bus::EventBus`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // -- devices --
    /// A never-before-seen device appeared and was registered.
    #[serde(rename = "device:joined")]
    NewDeviceJoined {
        serial: DeviceSerial,
        volume_name: String,
    },

    /// A known device (ghost) was plugged back in.
    #[serde(rename = "device:inserted")]
    DeviceInserted {
        serial: DeviceSerial,
        root: PathBuf,
    },

    /// A device went offline and collapsed to ghost form.
    #[serde(rename = "device:removed")]
    DeviceRemoved { serial: DeviceSerial },

    #[serde(rename = "device:state")]
    DeviceStateChanged {
        serial: DeviceSerial,
        old: DeviceState,
        new: DeviceState,
    },

    // -- copy pipeline --
    #[serde(rename = "file:discovered")]
    FileDiscovered {
        path: PathBuf,
        size: u64,
        serial: DeviceSerial,
    },

    /// Published exactly once per copy attempt, on every outcome.
    #[serde(rename = "copy:completed")]
    CopyCompleted {
        source: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        destination: Option<PathBuf>,
        size: u64,
        bytes_copied: u64,
        result: CopyResult,
        serial: DeviceSerial,
    },

    // -- storage --
    #[serde(rename = "storage:low")]
    StorageLow {
        work_dir: PathBuf,
        free_bytes: u64,
        threshold_bytes: u64,
        level: StorageLevel,
    },

    #[serde(rename = "storage:recovered")]
    StorageRecovered {
        work_dir: PathBuf,
        free_bytes: u64,
    },

    #[serde(rename = "recycler:files")]
    FilesRecycled {
        paths: Vec<PathBuf>,
        bytes_freed: u64,
        strategy: RecycleStrategy,
    },

    #[serde(rename = "recycler:folders")]
    EmptyFoldersDeleted { folders: Vec<PathBuf>, count: usize },
}

/// Concrete event type, used for listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NewDeviceJoined,
    DeviceInserted,
    DeviceRemoved,
    DeviceStateChanged,
    FileDiscovered,
    CopyCompleted,
    StorageLow,
    StorageRecovered,
    FilesRecycled,
    EmptyFoldersDeleted,
}

impl EventKind {
    /// Every kind, for listeners interested in the whole stream.
    pub const ALL: [EventKind; 10] = [
        EventKind::NewDeviceJoined,
        EventKind::DeviceInserted,
        EventKind::DeviceRemoved,
        EventKind::DeviceStateChanged,
        EventKind::FileDiscovered,
        EventKind::CopyCompleted,
        EventKind::StorageLow,
        EventKind::StorageRecovered,
        EventKind::FilesRecycled,
        EventKind::EmptyFoldersDeleted,
    ];
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::NewDeviceJoined { .. } => EventKind::NewDeviceJoined,
            Event::DeviceInserted { .. } => EventKind::DeviceInserted,
            Event::DeviceRemoved { .. } => EventKind::DeviceRemoved,
            Event::DeviceStateChanged { .. } => EventKind::DeviceStateChanged,
            Event::FileDiscovered { .. } => EventKind::FileDiscovered,
            Event::CopyCompleted { .. } => EventKind::CopyCompleted,
            Event::StorageLow { .. } => EventKind::StorageLow,
            Event::StorageRecovered { .. } => EventKind::StorageRecovered,
            Event::FilesRecycled { .. } => EventKind::FilesRecycled,
            Event::EmptyFoldersDeleted { .. } => EventKind::EmptyFoldersDeleted,
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Event::NewDeviceJoined { .. } => "device:joined",
            Event::DeviceInserted { .. } => "device:inserted",
            Event::DeviceRemoved { .. } => "device:removed",
            Event::DeviceStateChanged { .. } => "device:state",
            Event::FileDiscovered { .. } => "file:discovered",
            Event::CopyCompleted { .. } => "copy:completed",
            Event::StorageLow { .. } => "storage:low",
            Event::StorageRecovered { .. } => "storage:recovered",
            Event::FilesRecycled { .. } => "recycler:files",
            Event::EmptyFoldersDeleted { .. } => "recycler:folders",
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
