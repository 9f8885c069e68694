// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device discovery, state upkeep, and scanner arbitration.
//!
//! The manager exclusively owns the device set and the serial → scanner
//! registry. Each tick runs four steps (discover, update, storage
//! arbitration, scanner arbitration) with a cancellation check between
//! them. Events are collected under the registry lock and dispatched
//! after it is released.

use crate::bus::EventBus;
use crate::copy::CopyContext;
use crate::device::lifecycle::{ExitReason, SnifferLifecycleManager};
use crate::device::scanner::{spawn_scanner, ScannerContext, ScannerHandle};
use crate::error::EngineError;
use crate::scheduler::PriorityScheduler;
use crate::service::Service;
use async_trait::async_trait;
use parking_lot::Mutex;
use pk_adapters::VolumeProvider;
use pk_core::device::AccessProbe;
use pk_core::{
    Clock, ConfigHandle, Device, DeviceRecord, DeviceSerial, DeviceState, Event, StorageLevel,
    SystemClock,
};
use pk_storage::{encode_blob, parse_blob, RecordStore, StorageController};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Collaborators handed to the manager at construction.
pub struct DeviceManagerDeps {
    pub volumes: Arc<dyn VolumeProvider>,
    pub records: Arc<dyn RecordStore>,
    pub storage: Arc<StorageController>,
    pub scheduler: Arc<PriorityScheduler>,
    pub copy_ctx: Arc<CopyContext>,
    pub bus: Arc<EventBus>,
    pub lifecycle: Arc<SnifferLifecycleManager>,
    pub config: ConfigHandle,
}

/// Periodic service owning devices and their scanners.
pub struct DeviceManager<C: Clock = SystemClock> {
    devices: Mutex<HashMap<DeviceSerial, Device>>,
    scanners: Mutex<HashMap<DeviceSerial, ScannerHandle>>,
    volumes: Arc<dyn VolumeProvider>,
    records: Arc<dyn RecordStore>,
    storage: Arc<StorageController>,
    scheduler: Arc<PriorityScheduler>,
    copy_ctx: Arc<CopyContext>,
    bus: Arc<EventBus>,
    lifecycle: Arc<SnifferLifecycleManager>,
    config: ConfigHandle,
    clock: C,
    last_level: Mutex<StorageLevel>,
    shutdown: CancellationToken,
}

impl<C: Clock> DeviceManager<C> {
    pub fn with_clock(deps: DeviceManagerDeps, clock: C) -> Self {
        let manager = Self {
            devices: Mutex::new(HashMap::new()),
            scanners: Mutex::new(HashMap::new()),
            volumes: deps.volumes,
            records: deps.records,
            storage: deps.storage,
            scheduler: deps.scheduler,
            copy_ctx: deps.copy_ctx,
            bus: deps.bus,
            lifecycle: deps.lifecycle,
            config: deps.config,
            clock,
            last_level: Mutex::new(StorageLevel::Ok),
            shutdown: CancellationToken::new(),
        };
        manager.load_ghosts();
        manager
    }

    /// Load persisted records as ghosts.
    fn load_ghosts(&self) {
        let blob = match self.records.load_blob() {
            Ok(Some(blob)) => blob,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, "device records unavailable");
                return;
            }
        };
        let mut devices = self.devices.lock();
        for record in parse_blob(&blob) {
            tracing::debug!(serial = %record.serial, name = record.volume_name, "loaded ghost");
            devices.insert(
                record.serial.clone(),
                Device::ghost(record.serial, record.volume_name),
            );
        }
    }

    /// Persist the device set as records. System disks are left out so a
    /// restart never resurrects one as a scannable ghost.
    fn persist_records(&self) {
        let records: Vec<DeviceRecord> = self
            .devices
            .lock()
            .values()
            .filter(|d| !d.is_system_disk())
            .map(|d| DeviceRecord::new(d.serial().clone(), d.volume_name()))
            .collect();
        if let Err(e) = self.records.store_blob(&encode_blob(&records)) {
            tracing::warn!(error = %e, "persisting device records failed");
        }
    }

    /// Empty the persisted record store.
    pub fn clear_device_records(&self) -> Result<(), EngineError> {
        self.records.clear()?;
        Ok(())
    }

    /// Snapshot of `serial → state` for inspection.
    pub fn device_states(&self) -> HashMap<DeviceSerial, DeviceState> {
        self.devices
            .lock()
            .iter()
            .map(|(serial, device)| (serial.clone(), device.state()))
            .collect()
    }

    pub fn has_paused_scanners(&self) -> bool {
        self.devices
            .lock()
            .values()
            .any(|d| d.state() == DeviceState::Paused)
    }

    /// Step 1: bring the registry in line with the mounted volumes.
    fn discover(&self) {
        let blacklist = &self.config.devices.blacklist;
        let mut events = Vec::new();
        let mut dirty = false;

        for root in self.volumes.roots() {
            if self.shutdown.is_cancelled() {
                break;
            }
            let info = match self.volumes.volume_info(&root) {
                Ok(info) => info,
                Err(e) => {
                    tracing::debug!(root = %root.display(), error = %e, "volume query failed");
                    continue;
                }
            };
            if info.serial.is_empty() || blacklist.iter().any(|s| s == &info.serial) {
                continue;
            }
            let serial = DeviceSerial::new(&info.serial);
            let system_disk =
                info.is_system_filesystem() || same_volume(&self.config.copy.work_path, &root);

            let mut devices = self.devices.lock();
            let known_ghost = match devices.get(&serial) {
                Some(device) => {
                    if !device.is_ghost() {
                        continue;
                    }
                    true
                }
                None => false,
            };
            if known_ghost && system_disk {
                // Recorded before it was recognized as a system disk;
                // rebuild it disabled.
                let device = Device::new(serial.clone(), root.clone(), info.name.clone(), true);
                devices.insert(serial.clone(), device);
                events.push(Event::DeviceInserted {
                    serial: serial.clone(),
                    root: root.clone(),
                });
                dirty = true;
            } else if known_ghost {
                let Some(device) = devices.get_mut(&serial) else {
                    continue;
                };
                let renamed = device.volume_name() != info.name;
                let old = device.merge_root(root.clone(), info.name.clone());
                if device.take_state_changed() {
                    events.push(Event::DeviceStateChanged {
                        serial: serial.clone(),
                        old,
                        new: device.state(),
                    });
                }
                events.push(Event::DeviceInserted {
                    serial: serial.clone(),
                    root: root.clone(),
                });
                dirty |= renamed;
                tracing::info!(%serial, root = %root.display(), "known device reattached");
            } else {
                let device =
                    Device::new(serial.clone(), root.clone(), info.name.clone(), system_disk);
                tracing::info!(
                    %serial,
                    root = %root.display(),
                    name = info.name,
                    system_disk,
                    "new device"
                );
                devices.insert(serial.clone(), device);
                events.push(Event::NewDeviceJoined {
                    serial,
                    volume_name: info.name,
                });
                dirty = true;
            }
        }

        if dirty {
            self.persist_records();
        }
        for event in &events {
            self.bus.dispatch(event);
        }
    }

    /// Step 2: refresh each live device's state from root accessibility.
    fn update_states(&self) {
        let mut events = Vec::new();
        {
            let mut devices = self.devices.lock();
            for device in devices.values_mut() {
                let Some(root) = device.root_path() else {
                    continue;
                };
                let probe = probe_access(root);
                let old = device.state();
                device.apply_probe(probe);
                if device.state() == DeviceState::Offline {
                    device.collapse_to_ghost();
                    events.push(Event::DeviceRemoved {
                        serial: device.serial().clone(),
                    });
                }
                if device.take_state_changed() {
                    events.push(Event::DeviceStateChanged {
                        serial: device.serial().clone(),
                        old,
                        new: device.state(),
                    });
                }
            }
        }
        for event in &events {
            self.bus.dispatch(event);
        }
    }

    /// Step 3: react to storage level transitions.
    async fn storage_arbitration(&self) {
        let status = self.storage.status();
        let last = *self.last_level.lock();

        if status.level != last {
            *self.last_level.lock() = status.level;
            let work_dir = self.storage.work_path().to_path_buf();
            let event = match status.level {
                StorageLevel::Ok => Event::StorageRecovered {
                    work_dir,
                    free_bytes: status.free_bytes,
                },
                level => Event::StorageLow {
                    work_dir,
                    free_bytes: status.free_bytes,
                    threshold_bytes: self.storage.reserved_bytes(),
                    level,
                },
            };
            self.bus.dispatch(&event);
        }

        match status.level {
            StorageLevel::Critical => self.pause_all_scanners().await,
            StorageLevel::Ok => {
                if self.has_paused_scanners() {
                    self.resume_all_scanners();
                }
            }
            StorageLevel::Low => {}
        }
    }

    /// Move every Idle/Scanning device to Paused and stop its scanner.
    /// Disabled devices are untouched.
    pub async fn pause_all_scanners(&self) {
        let mut events = Vec::new();
        let to_pause: Vec<DeviceSerial> = {
            let mut devices = self.devices.lock();
            devices
                .values_mut()
                .filter(|d| matches!(d.state(), DeviceState::Idle | DeviceState::Scanning))
                .map(|device| {
                    let old = device.set_state(DeviceState::Paused);
                    if device.take_state_changed() {
                        events.push(Event::DeviceStateChanged {
                            serial: device.serial().clone(),
                            old,
                            new: DeviceState::Paused,
                        });
                    }
                    device.serial().clone()
                })
                .collect()
        };
        for serial in &to_pause {
            let handle = self.scanners.lock().remove(serial);
            if let Some(handle) = handle {
                handle.stop().await;
            }
            self.lifecycle
                .on_scanner_exit(serial, ExitReason::StoragePause, self.clock.now());
        }
        if !to_pause.is_empty() {
            tracing::info!(paused = to_pause.len(), "storage critical, scanners paused");
        }
        for event in &events {
            self.bus.dispatch(event);
        }
    }

    /// Move every Paused device back to Idle; scanners restart via the
    /// arbitration step.
    pub fn resume_all_scanners(&self) {
        let mut events = Vec::new();
        {
            let mut devices = self.devices.lock();
            for device in devices.values_mut() {
                if device.state() != DeviceState::Paused {
                    continue;
                }
                let old = device.set_state(DeviceState::Idle);
                if device.take_state_changed() {
                    events.push(Event::DeviceStateChanged {
                        serial: device.serial().clone(),
                        old,
                        new: DeviceState::Idle,
                    });
                }
            }
        }
        if !events.is_empty() {
            tracing::info!(resumed = events.len(), "storage recovered, scanners resume");
        }
        for event in &events {
            self.bus.dispatch(event);
        }
    }

    /// Step 4: reconcile scanners with device states.
    async fn arbitrate_scanners(&self) {
        // Reap finished scanners and stop those whose device left Scanning.
        let mut finished = Vec::new();
        let mut to_stop = Vec::new();
        {
            let devices = self.devices.lock();
            let scanners = self.scanners.lock();
            for (serial, handle) in scanners.iter() {
                if handle.is_finished() {
                    finished.push(serial.clone());
                } else if devices.get(serial).map(Device::state) != Some(DeviceState::Scanning) {
                    to_stop.push(serial.clone());
                }
            }
        }
        for serial in finished {
            let handle = self.scanners.lock().remove(&serial);
            if let Some(handle) = handle {
                let reason = handle.stop().await.unwrap_or(ExitReason::Error);
                self.lifecycle
                    .on_scanner_exit(&serial, reason, self.clock.now());
                self.set_device_state(&serial, DeviceState::Idle, Some(DeviceState::Scanning));
            }
        }
        for serial in to_stop {
            let handle = self.scanners.lock().remove(&serial);
            if let Some(handle) = handle {
                handle.stop().await;
            }
        }

        // Start scanners for Idle devices with a resolvable root.
        let now = self.clock.now();
        let candidates: Vec<ScannerContext> = {
            let devices = self.devices.lock();
            let scanners = self.scanners.lock();
            devices
                .values()
                .filter(|d| d.state() == DeviceState::Idle)
                .filter(|d| !scanners.contains_key(d.serial()))
                .filter(|d| self.lifecycle.can_restart(d.serial(), now))
                .filter_map(|d| d.handle())
                .map(|device| ScannerContext {
                    device,
                    config: Arc::clone(&self.config),
                    scheduler: Arc::clone(&self.scheduler),
                    copy_ctx: Arc::clone(&self.copy_ctx),
                    bus: Arc::clone(&self.bus),
                })
                .collect()
        };
        for ctx in candidates {
            let serial = ctx.device.serial.clone();
            let handle = spawn_scanner(ctx);
            self.scanners.lock().insert(serial.clone(), handle);
            self.lifecycle.on_scanner_started(&serial);
            self.set_device_state(&serial, DeviceState::Scanning, Some(DeviceState::Idle));
        }
    }

    /// Transition one device, publishing the change. When `expect` is
    /// given the transition only applies from that state.
    fn set_device_state(
        &self,
        serial: &DeviceSerial,
        new: DeviceState,
        expect: Option<DeviceState>,
    ) {
        let event = {
            let mut devices = self.devices.lock();
            let Some(device) = devices.get_mut(serial) else {
                return;
            };
            if let Some(expected) = expect {
                if device.state() != expected {
                    return;
                }
            }
            let old = device.set_state(new);
            device.take_state_changed().then(|| Event::DeviceStateChanged {
                serial: serial.clone(),
                old,
                new,
            })
        };
        if let Some(event) = event {
            self.bus.dispatch(&event);
        }
    }

    async fn stop_all_scanners(&self) {
        let handles: Vec<(DeviceSerial, ScannerHandle)> =
            self.scanners.lock().drain().collect();
        for (serial, handle) in handles {
            tracing::debug!(%serial, "stopping scanner");
            handle.stop().await;
        }
    }
}

impl DeviceManager<SystemClock> {
    pub fn new(deps: DeviceManagerDeps) -> Self {
        Self::with_clock(deps, SystemClock)
    }
}

/// Classify one root's accessibility.
fn probe_access(root: &Path) -> AccessProbe {
    match std::fs::read_dir(root) {
        Ok(_) => AccessProbe::Readable,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => AccessProbe::NotFound,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => AccessProbe::Denied,
        Err(_) => AccessProbe::IoError,
    }
}

/// Whether `work` lives on the same volume as `root`.
#[cfg(windows)]
fn same_volume(work: &Path, root: &Path) -> bool {
    fn drive(path: &Path) -> Option<char> {
        path.to_string_lossy()
            .chars()
            .next()
            .map(|c| c.to_ascii_uppercase())
            .filter(char::is_ascii_alphabetic)
    }
    match (drive(work), drive(root)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Whether `work` lives on the same volume as `root`.
#[cfg(not(windows))]
fn same_volume(work: &Path, root: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (std::fs::metadata(work), std::fs::metadata(root)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev(),
        _ => false,
    }
}

#[async_trait]
impl<C: Clock + 'static> Service for DeviceManager<C> {
    fn name(&self) -> &'static str {
        "device-manager"
    }

    fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.config.devices.poll_interval_ms)
    }

    async fn tick(&self) -> Result<(), EngineError> {
        if self.shutdown.is_cancelled() {
            return Ok(());
        }
        self.discover();
        if self.shutdown.is_cancelled() {
            return Ok(());
        }
        self.update_states();
        if self.shutdown.is_cancelled() {
            return Ok(());
        }
        self.storage_arbitration().await;
        if self.shutdown.is_cancelled() {
            return Ok(());
        }
        self.arbitrate_scanners().await;
        Ok(())
    }

    async fn cleanup(&self) -> Result<(), EngineError> {
        self.shutdown.cancel();
        self.stop_all_scanners().await;
        self.persist_records();
        Ok(())
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
