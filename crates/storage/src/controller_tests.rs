// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn controller(free: u64, total: u64, reserved: u64) -> (StorageController, Arc<FakeProbe>) {
    let probe = Arc::new(FakeProbe::new(free, total));
    let controller =
        StorageController::with_probe(PathBuf::from("/work"), reserved, Arc::clone(&probe) as _);
    (controller, probe)
}

#[test]
fn status_reflects_probe() {
    let (controller, _) = controller(5_000, 10_000, 1_000);
    let status = controller.status();

    assert_eq!(status.free_bytes, 5_000);
    assert_eq!(status.used_bytes, 5_000);
    assert_eq!(status.total_bytes, 10_000);
    assert_eq!(status.level, StorageLevel::Ok);
}

#[test]
fn level_follows_free_space() {
    let (controller, probe) = controller(5_000, 10_000, 1_000);
    assert_eq!(controller.level(), StorageLevel::Ok);

    probe.set_free(1_050);
    assert_eq!(controller.level(), StorageLevel::Low);

    probe.set_free(900);
    assert_eq!(controller.level(), StorageLevel::Critical);
    assert!(controller.is_critical());
}

#[test]
fn probe_failure_is_critical() {
    let (controller, probe) = controller(5_000, 10_000, 1_000);
    probe.set_failing(true);

    let status = controller.status();
    assert_eq!(status, StorageStatus::unavailable());
    assert!(status.is_critical());
}

#[test]
fn real_probe_reports_nonzero_space() {
    let dir = tempfile::tempdir().unwrap();
    let controller = StorageController::new(dir.path().to_path_buf(), 0);
    let status = controller.status();
    assert!(status.total_bytes > 0);
    assert_eq!(
        status.total_bytes,
        status.free_bytes + status.used_bytes
    );
}
