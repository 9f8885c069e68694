// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed daemon configuration.
//!
//! Loaded once at startup from a TOML file and shared read-only as a
//! [`ConfigHandle`]. Every key carries a serde default so an empty file
//! (or a missing one) is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Read-only shared view of the configuration.
pub type ConfigHandle = Arc<Config>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pool: PoolConfig,
    pub scanner: ScannerConfig,
    pub sniffer: SnifferConfig,
    pub filter: FilterConfig,
    pub suffix_filter: SuffixFilterConfig,
    pub copy: CopyConfig,
    pub rate_limiter: RateLimiterConfig,
    pub scheduler: SchedulerConfig,
    pub storage: StorageConfig,
    pub recycler: RecyclerConfig,
    pub devices: DevicesConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from `path` when it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Copy executor pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub core_workers: usize,
    pub max_workers: usize,
    pub keep_alive_seconds: u64,
    pub task_queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            core_workers: 2,
            max_workers: 4,
            keep_alive_seconds: 60,
            task_queue_capacity: 256,
        }
    }
}

/// Per-device scanner behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub watch_enabled: bool,
    /// Change events accumulated before copies are triggered.
    pub watch_threshold: u32,
    pub watch_reset_interval_seconds: u64,
    /// Upper bound on mirrored file size, in bytes.
    pub max_file_size: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            watch_enabled: true,
            watch_threshold: 10,
            watch_reset_interval_seconds: 60,
            max_file_size: 100 * 1024 * 1024,
        }
    }
}

/// Restart delays applied after a scanner terminates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnifferConfig {
    pub wait_normal_minutes: u64,
    pub wait_error_minutes: u64,
}

impl Default for SnifferConfig {
    fn default() -> Self {
        Self {
            wait_normal_minutes: 30,
            wait_error_minutes: 5,
        }
    }
}

/// Basic per-file acceptance policy applied during scans.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub include_hidden: bool,
    pub follow_symlinks: bool,
    /// Accept only files modified at or after this epoch-seconds bound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_after: Option<u64>,
    /// Accept only files modified at or before this epoch-seconds bound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_before: Option<u64>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            include_hidden: false,
            follow_symlinks: false,
            modified_after: None,
            modified_before: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuffixMode {
    None,
    Whitelist,
    Blacklist,
}

/// Extension-based acceptance applied after the basic filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuffixFilterConfig {
    pub mode: SuffixMode,
    pub suffixes: Vec<String>,
}

impl SuffixFilterConfig {
    /// The preset short-list of document and media extensions.
    pub fn preset_suffixes() -> Vec<String> {
        [
            "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt", "jpg", "jpeg", "png",
            "mp4", "mp3",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}

impl Default for SuffixFilterConfig {
    fn default() -> Self {
        Self {
            mode: SuffixMode::None,
            suffixes: Self::preset_suffixes(),
        }
    }
}

/// Copy path behavior: destination, buffering, and rate ceiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyConfig {
    pub buffer_size: usize,
    pub work_path: PathBuf,
    /// Bytes per second; zero or negative disables limiting.
    pub rate_limit: i64,
    pub rate_burst_size: u64,
    /// Base rate that load-level adjustment scales from. Zero means
    /// "use the current rate as the base".
    pub rate_limit_base: i64,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            buffer_size: 64 * 1024,
            work_path: PathBuf::from("packrat-work"),
            rate_limit: 0,
            rate_burst_size: 1024 * 1024,
            rate_limit_base: 0,
        }
    }
}

/// Load-level rate scaling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    /// Percentage of base rate applied at medium load.
    pub medium_load_percent: u32,
    /// Percentage of base rate applied at high load.
    pub high_load_percent: u32,
    /// Seconds load must stay low before the rate is raised back to base.
    pub raise_hold_secs: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            medium_load_percent: 70,
            high_load_percent: 40,
            raise_hold_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub tick_interval_ms: u64,
    /// Queue cap during accumulation; `submit` refuses beyond this.
    pub accumulation_max_queue: usize,
    pub medium_batch: usize,
    pub low_batch: usize,
    /// Batch size of the legacy immediate-dispatch submit form. Accepted
    /// for config compatibility; inert under queued-only dispatch.
    pub high_batch: usize,
    /// Priority floor of the legacy immediate-dispatch submit form.
    /// Accepted for config compatibility; inert under queued-only dispatch.
    pub high_priority_threshold: u8,
    pub load: LoadConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 500,
            accumulation_max_queue: 2000,
            medium_batch: 50,
            low_batch: 30,
            high_batch: 10,
            high_priority_threshold: 80,
            load: LoadConfig::default(),
        }
    }
}

/// Load evaluator weights and thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    pub high_threshold: u8,
    pub low_threshold: u8,
    pub cache_ms: u64,
    pub queue_weight: u32,
    pub speed_weight: u32,
    pub activity_weight: u32,
    pub rejection_weight: u32,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            high_threshold: 70,
            low_threshold: 40,
            cache_ms: 500,
            queue_weight: 35,
            speed_weight: 35,
            activity_weight: 15,
            rejection_weight: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Free space at or under this is CRITICAL.
    pub reserved_bytes: u64,
    /// Upper bound on work-directory size; zero disables the bound.
    pub max_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            reserved_bytes: 1024 * 1024 * 1024,
            max_bytes: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecyclerConfig {
    pub strategy: crate::storage_status::RecycleStrategy,
    pub protected_age_hours: u64,
    pub tick_minutes: u64,
}

impl Default for RecyclerConfig {
    fn default() -> Self {
        Self {
            strategy: crate::storage_status::RecycleStrategy::Auto,
            protected_age_hours: 1,
            tick_minutes: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DevicesConfig {
    /// Serials never mirrored.
    pub blacklist: Vec<String>,
    pub poll_interval_ms: u64,
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            blacklist: Vec::new(),
            poll_interval_ms: 2000,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
