// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent device record: `(serial, volume_name)` ⟷ `"serial::name"`.

use crate::id::DeviceSerial;
use std::str::FromStr;
use thiserror::Error;

/// Separator between serial and volume name inside one record.
pub const FIELD_SEPARATOR: &str = "::";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("record has no '::' separator: {0:?}")]
    MissingSeparator(String),
    #[error("record has an empty serial: {0:?}")]
    EmptySerial(String),
}

/// Persistent projection of a device, stringified as `"serial::name"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub serial: DeviceSerial,
    pub volume_name: String,
}

impl DeviceRecord {
    pub fn new(serial: DeviceSerial, volume_name: impl Into<String>) -> Self {
        Self {
            serial,
            volume_name: volume_name.into(),
        }
    }
}

impl std::fmt::Display for DeviceRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.serial, FIELD_SEPARATOR, self.volume_name)
    }
}

impl FromStr for DeviceRecord {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (serial, name) = s
            .split_once(FIELD_SEPARATOR)
            .ok_or_else(|| RecordError::MissingSeparator(s.to_string()))?;
        if serial.is_empty() {
            return Err(RecordError::EmptySerial(s.to_string()));
        }
        Ok(Self {
            serial: DeviceSerial::new(serial),
            volume_name: name.to_string(),
        })
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
