// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builders and helpers shared by other crates' tests.

use crate::config::Config;
use crate::device::Device;
use crate::id::DeviceSerial;
use std::path::Path;

/// A config rooted at `work`, tuned for fast tests: tiny buffers, no
/// watch phase, immediate ticks.
pub fn test_config(work: &Path) -> Config {
    let mut config = Config::default();
    config.copy.work_path = work.to_path_buf();
    config.copy.buffer_size = 8;
    config.scanner.watch_enabled = false;
    config.scheduler.tick_interval_ms = 10;
    config.devices.poll_interval_ms = 10;
    config
}

/// A live (non-ghost) device with the given serial, rooted at `root`.
pub fn test_device(serial: &str, root: &Path) -> Device {
    Device::new(
        DeviceSerial::new(serial),
        root.to_path_buf(),
        format!("VOL-{serial}"),
        false,
    )
}
