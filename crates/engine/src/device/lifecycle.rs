// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scanner restart scheduling.
//!
//! When a scanner terminates, the reason decides how long the device
//! manager must wait before starting the next one: a normal completion
//! waits the long interval, an error the short one, and a storage pause
//! is only tracked: resumption is driven by the device manager when
//! storage recovers, not by the clock.

use parking_lot::Mutex;
use pk_core::config::SnifferConfig;
use pk_core::DeviceSerial;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// Why a scanner stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    NormalCompletion,
    Error,
    StoragePause,
}

#[derive(Debug, Clone)]
struct RestartHold {
    reason: ExitReason,
    until: Instant,
}

/// Tracks per-device restart holds and storage-paused scanners.
pub struct SnifferLifecycleManager {
    holds: Mutex<HashMap<DeviceSerial, RestartHold>>,
    storage_paused: Mutex<HashSet<DeviceSerial>>,
    wait_normal: Duration,
    wait_error: Duration,
}

impl SnifferLifecycleManager {
    pub fn new(config: &SnifferConfig) -> Self {
        Self {
            holds: Mutex::new(HashMap::new()),
            storage_paused: Mutex::new(HashSet::new()),
            wait_normal: Duration::from_secs(config.wait_normal_minutes * 60),
            wait_error: Duration::from_secs(config.wait_error_minutes * 60),
        }
    }

    /// Record a scanner exit at `now`.
    pub fn on_scanner_exit(&self, serial: &DeviceSerial, reason: ExitReason, now: Instant) {
        match reason {
            ExitReason::NormalCompletion => {
                self.holds.lock().insert(
                    serial.clone(),
                    RestartHold {
                        reason,
                        until: now + self.wait_normal,
                    },
                );
            }
            ExitReason::Error => {
                self.holds.lock().insert(
                    serial.clone(),
                    RestartHold {
                        reason,
                        until: now + self.wait_error,
                    },
                );
            }
            ExitReason::StoragePause => {
                self.storage_paused.lock().insert(serial.clone());
            }
        }
        tracing::debug!(%serial, ?reason, "scanner exited");
    }

    /// Whether a new scanner may start for `serial` at `now`. An expired
    /// hold is consumed by this check.
    pub fn can_restart(&self, serial: &DeviceSerial, now: Instant) -> bool {
        let mut holds = self.holds.lock();
        match holds.get(serial) {
            Some(hold) if hold.until > now => false,
            Some(_) => {
                holds.remove(serial);
                true
            }
            None => true,
        }
    }

    /// Clear tracking once a scanner is actually running again.
    pub fn on_scanner_started(&self, serial: &DeviceSerial) {
        self.holds.lock().remove(serial);
        self.storage_paused.lock().remove(serial);
    }

    pub fn is_storage_paused(&self, serial: &DeviceSerial) -> bool {
        self.storage_paused.lock().contains(serial)
    }

    pub fn pending_holds(&self) -> usize {
        self.holds.lock().len()
    }

    /// Exit reason currently holding `serial`, if any.
    pub fn hold_reason(&self, serial: &DeviceSerial) -> Option<ExitReason> {
        self.holds.lock().get(serial).map(|hold| hold.reason)
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
