// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device-record persistence.
//!
//! All known devices are stored as one blob, `rec1||rec2||…`, each record
//! being `serial::volume_name`. The blob lives in a user-scoped state file;
//! malformed tokens are skipped with a warning so one bad entry never
//! poisons the list.

use pk_core::DeviceRecord;
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;

/// Separator between records inside the blob.
pub const RECORD_SEPARATOR: &str = "||";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no user state directory available")]
    NoStateDir,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Keyed blob store holding the persisted device list.
pub trait RecordStore: Send + Sync {
    fn load_blob(&self) -> Result<Option<String>, StoreError>;
    fn store_blob(&self, blob: &str) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

/// Decode a blob, skipping malformed tokens with a warning.
pub fn parse_blob(blob: &str) -> Vec<DeviceRecord> {
    blob.split(RECORD_SEPARATOR)
        .filter(|token| !token.is_empty())
        .filter_map(|token| match token.parse::<DeviceRecord>() {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(token, error = %e, "skipping malformed device record");
                None
            }
        })
        .collect()
}

/// Encode records into the persisted blob form.
pub fn encode_blob(records: &[DeviceRecord]) -> String {
    records
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(RECORD_SEPARATOR)
}

/// File-backed store under the user's state directory.
pub struct FileRecordStore {
    path: PathBuf,
}

impl FileRecordStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store at `<state_dir>/packrat/device_records`.
    pub fn in_state_dir() -> Result<Self, StoreError> {
        let base = dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .ok_or(StoreError::NoStateDir)?;
        Ok(Self::new(base.join("packrat").join("device_records")))
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl RecordStore for FileRecordStore {
    fn load_blob(&self) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store_blob(&self, blob: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Write-then-rename so a crash never leaves a torn blob.
        let tmp = self.path.with_extension("tmp");
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(blob.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store for tests.
#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
pub struct MemoryRecordStore {
    blob: parking_lot::Mutex<Option<String>>,
}

#[cfg(any(test, feature = "test-support"))]
impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(blob: &str) -> Self {
        Self {
            blob: parking_lot::Mutex::new(Some(blob.to_string())),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl RecordStore for MemoryRecordStore {
    fn load_blob(&self) -> Result<Option<String>, StoreError> {
        Ok(self.blob.lock().clone())
    }

    fn store_blob(&self, blob: &str) -> Result<(), StoreError> {
        *self.blob.lock() = Some(blob.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.blob.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
#[path = "records_tests.rs"]
mod tests;
