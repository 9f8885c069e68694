// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work-volume storage status and recycling strategy.

use serde::{Deserialize, Serialize};

/// Free-space band of the work volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageLevel {
    Ok,
    Low,
    Critical,
}

impl StorageLevel {
    /// Pure classification: free space at or under `reserved` is Critical,
    /// within 10% above it Low, anything else Ok.
    pub fn classify(free_bytes: u64, reserved_bytes: u64) -> Self {
        if free_bytes <= reserved_bytes {
            StorageLevel::Critical
        } else if free_bytes <= reserved_bytes + reserved_bytes / 10 {
            StorageLevel::Low
        } else {
            StorageLevel::Ok
        }
    }
}

impl std::fmt::Display for StorageLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            StorageLevel::Ok => "ok",
            StorageLevel::Low => "low",
            StorageLevel::Critical => "critical",
        })
    }
}

/// Point-in-time view of the work volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageStatus {
    pub free_bytes: u64,
    pub used_bytes: u64,
    pub total_bytes: u64,
    pub level: StorageLevel,
}

impl StorageStatus {
    pub fn new(free_bytes: u64, total_bytes: u64, reserved_bytes: u64) -> Self {
        Self {
            free_bytes,
            used_bytes: total_bytes.saturating_sub(free_bytes),
            total_bytes,
            level: StorageLevel::classify(free_bytes, reserved_bytes),
        }
    }

    /// Conservative value reported when the volume cannot be probed.
    pub fn unavailable() -> Self {
        Self {
            free_bytes: 0,
            used_bytes: 0,
            total_bytes: 0,
            level: StorageLevel::Critical,
        }
    }

    pub fn is_critical(&self) -> bool {
        self.level == StorageLevel::Critical
    }
}

/// File-selection strategy used when recycling under storage pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecycleStrategy {
    /// Oldest copies first.
    TimeFirst,
    /// Largest files first.
    SizeFirst,
    /// TimeFirst under Low pressure, SizeFirst under Critical.
    Auto,
}

impl std::fmt::Display for RecycleStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RecycleStrategy::TimeFirst => "time_first",
            RecycleStrategy::SizeFirst => "size_first",
            RecycleStrategy::Auto => "auto",
        })
    }
}

#[cfg(test)]
#[path = "storage_status_tests.rs"]
mod tests;
