// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device model and lifecycle state machine.
//!
//! A [`Device`] is identified by its volume serial; equality and hashing
//! ignore every other attribute. Devices are created by discovery or loaded
//! as ghosts from persisted records, and are never destroyed while the
//! daemon runs; an unplugged device collapses back to ghost form.

use crate::id::DeviceSerial;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Lifecycle state of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceState {
    /// Known from a persisted record but not currently mounted.
    Offline,
    /// Mounted but not readable (access denied or I/O error).
    Unavailable,
    /// Readable and waiting for a scanner.
    Idle,
    /// A scanner is running for this device.
    Scanning,
    /// Held by storage pressure; resumed by the device manager.
    Paused,
    /// Never scanned (system disks, operator decision).
    Disabled,
}

impl DeviceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Offline => "offline",
            DeviceState::Unavailable => "unavailable",
            DeviceState::Idle => "idle",
            DeviceState::Scanning => "scanning",
            DeviceState::Paused => "paused",
            DeviceState::Disabled => "disabled",
        }
    }
}

impl std::fmt::Display for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of probing a device root for accessibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessProbe {
    Readable,
    NotFound,
    Denied,
    IoError,
}

/// A removable volume tracked by the device manager.
#[derive(Debug, Clone)]
pub struct Device {
    serial: DeviceSerial,
    root_path: Option<PathBuf>,
    volume_name: String,
    system_disk: bool,
    state: DeviceState,
    state_changed: bool,
}

impl Device {
    /// Create a freshly discovered device. System disks start Disabled,
    /// everything else starts Idle.
    pub fn new(
        serial: DeviceSerial,
        root_path: PathBuf,
        volume_name: impl Into<String>,
        system_disk: bool,
    ) -> Self {
        let state = if system_disk {
            DeviceState::Disabled
        } else {
            DeviceState::Idle
        };
        Self {
            serial,
            root_path: Some(root_path),
            volume_name: volume_name.into(),
            system_disk,
            state,
            state_changed: false,
        }
    }

    /// Create a ghost from a persisted record: offline, no root.
    pub fn ghost(serial: DeviceSerial, volume_name: impl Into<String>) -> Self {
        Self {
            serial,
            root_path: None,
            volume_name: volume_name.into(),
            system_disk: false,
            state: DeviceState::Offline,
            state_changed: false,
        }
    }

    pub fn serial(&self) -> &DeviceSerial {
        &self.serial
    }

    pub fn root_path(&self) -> Option<&Path> {
        self.root_path.as_deref()
    }

    pub fn volume_name(&self) -> &str {
        &self.volume_name
    }

    pub fn is_system_disk(&self) -> bool {
        self.system_disk
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn is_ghost(&self) -> bool {
        self.state == DeviceState::Offline && self.root_path.is_none()
    }

    /// Transition to `new`, marking `state_changed` when the state differs.
    /// Returns the previous state.
    pub fn set_state(&mut self, new: DeviceState) -> DeviceState {
        let old = self.state;
        if old != new {
            self.state = new;
            self.state_changed = true;
        }
        old
    }

    /// Single-consumer read of the change flag; clears it.
    pub fn take_state_changed(&mut self) -> bool {
        std::mem::take(&mut self.state_changed)
    }

    /// Rebuild a ghost as a live device at `root`. Returns the old state.
    pub fn merge_root(&mut self, root: PathBuf, volume_name: impl Into<String>) -> DeviceState {
        self.root_path = Some(root);
        self.volume_name = volume_name.into();
        self.set_state(DeviceState::Idle)
    }

    /// Drop the root and return to ghost form.
    pub fn collapse_to_ghost(&mut self) -> DeviceState {
        self.root_path = None;
        self.set_state(DeviceState::Offline)
    }

    /// Apply an accessibility probe. Disabled and Paused are never
    /// overwritten; an unreachable root collapses to Offline via the
    /// manager, not here.
    pub fn apply_probe(&mut self, probe: AccessProbe) -> DeviceState {
        match self.state {
            DeviceState::Disabled | DeviceState::Paused => self.state,
            _ => match probe {
                AccessProbe::Readable => match self.state {
                    DeviceState::Offline | DeviceState::Unavailable => {
                        self.set_state(DeviceState::Idle)
                    }
                    _ => self.state,
                },
                AccessProbe::NotFound => self.set_state(DeviceState::Offline),
                AccessProbe::Denied | AccessProbe::IoError => {
                    self.set_state(DeviceState::Unavailable)
                }
            },
        }
    }

    /// Cheap projection handed to scanners and copy tasks.
    pub fn handle(&self) -> Option<DeviceHandle> {
        self.root_path.as_ref().map(|root| DeviceHandle {
            serial: self.serial.clone(),
            root: root.clone(),
            volume_name: self.volume_name.clone(),
        })
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.serial == other.serial
    }
}

impl Eq for Device {}

impl std::hash::Hash for Device {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.serial.hash(state);
    }
}

/// Cloneable projection of a device, carried by scanners and copy tasks
/// instead of a back-pointer into the manager's registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    pub serial: DeviceSerial,
    pub root: PathBuf,
    pub volume_name: String,
}

impl DeviceHandle {
    /// Directory name under the work path: `<volume_name>_<serial>`.
    pub fn work_dir_name(&self) -> String {
        format!("{}_{}", self.volume_name, self.serial)
    }
}

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;
