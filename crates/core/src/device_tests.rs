// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn live(serial: &str) -> Device {
    Device::new(
        DeviceSerial::new(serial),
        PathBuf::from("/mnt/stick"),
        "STICK",
        false,
    )
}

#[test]
fn new_device_starts_idle() {
    let device = live("S1");
    assert_eq!(device.state(), DeviceState::Idle);
    assert!(!device.is_ghost());
}

#[test]
fn system_disk_starts_disabled() {
    let device = Device::new(DeviceSerial::new("C"), PathBuf::from("C:\\"), "OS", true);
    assert_eq!(device.state(), DeviceState::Disabled);
    assert!(device.is_system_disk());
}

#[test]
fn ghost_has_no_root() {
    let ghost = Device::ghost(DeviceSerial::new("S1"), "STICK");
    assert!(ghost.is_ghost());
    assert_eq!(ghost.root_path(), None);
    assert_eq!(ghost.state(), DeviceState::Offline);
    assert!(ghost.handle().is_none());
}

#[test]
fn equality_is_by_serial_only() {
    let a = live("S1");
    let mut b = Device::ghost(DeviceSerial::new("S1"), "OTHER");
    assert_eq!(a, b);

    b.set_state(DeviceState::Disabled);
    assert_eq!(a, b);
}

#[test]
fn set_state_marks_change_once() {
    let mut device = live("S1");
    device.set_state(DeviceState::Scanning);

    assert!(device.take_state_changed());
    // Cleared by the single consumer read.
    assert!(!device.take_state_changed());
}

#[test]
fn set_state_to_same_state_is_not_a_change() {
    let mut device = live("S1");
    device.set_state(DeviceState::Idle);
    assert!(!device.take_state_changed());
}

#[test]
fn merge_root_revives_ghost() {
    let mut ghost = Device::ghost(DeviceSerial::new("S"), "V");
    let old = ghost.merge_root(PathBuf::from("E:\\"), "V2");

    assert_eq!(old, DeviceState::Offline);
    assert_eq!(ghost.state(), DeviceState::Idle);
    assert_eq!(ghost.root_path(), Some(Path::new("E:\\")));
    assert_eq!(ghost.volume_name(), "V2");
    assert!(!ghost.is_ghost());
}

#[test]
fn collapse_drops_root() {
    let mut device = live("S1");
    device.collapse_to_ghost();
    assert!(device.is_ghost());
}

#[parameterized(
    offline_becomes_idle = { DeviceState::Offline, AccessProbe::Readable, DeviceState::Idle },
    unavailable_becomes_idle = { DeviceState::Unavailable, AccessProbe::Readable, DeviceState::Idle },
    scanning_stays_scanning = { DeviceState::Scanning, AccessProbe::Readable, DeviceState::Scanning },
    idle_goes_offline = { DeviceState::Idle, AccessProbe::NotFound, DeviceState::Offline },
    denied_is_unavailable = { DeviceState::Idle, AccessProbe::Denied, DeviceState::Unavailable },
    io_error_is_unavailable = { DeviceState::Scanning, AccessProbe::IoError, DeviceState::Unavailable },
    disabled_is_never_touched = { DeviceState::Disabled, AccessProbe::Readable, DeviceState::Disabled },
    paused_is_never_touched = { DeviceState::Paused, AccessProbe::Readable, DeviceState::Paused },
)]
fn probe_transitions(start: DeviceState, probe: AccessProbe, expected: DeviceState) {
    let mut device = live("S1");
    device.set_state(start);
    device.take_state_changed();

    device.apply_probe(probe);
    assert_eq!(device.state(), expected);
}

#[test]
fn handle_carries_work_dir_name() {
    let device = Device::new(
        DeviceSerial::new("1A2B"),
        PathBuf::from("E:\\"),
        "KINGSTON",
        false,
    );
    let handle = device.handle().unwrap();
    assert_eq!(handle.work_dir_name(), "KINGSTON_1A2B");
}
