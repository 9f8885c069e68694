// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pk-storage: work-volume space accounting, device-record persistence,
//! and file recycling mechanics.

pub mod controller;
pub mod records;
pub mod recycler;

pub use controller::{Fs2Probe, SpaceProbe, StorageController};
pub use records::{encode_blob, parse_blob, FileRecordStore, RecordStore, StoreError};
pub use recycler::{
    bytes_needed, collect_candidates, delete_files, find_empty_dirs, select_by_size,
    select_by_time, FileMeta,
};

#[cfg(any(test, feature = "test-support"))]
pub use controller::FakeProbe;
#[cfg(any(test, feature = "test-support"))]
pub use records::MemoryRecordStore;
