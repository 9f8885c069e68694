//! Storage-driven behavior: pause/resume, skip, and recycling.

use crate::prelude::SpecRig;
use pk_core::{CopyResult, DeviceState, Event, EventKind, RecycleStrategy, StorageLevel};
use pk_engine::{RecyclerService, Service};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

#[tokio::test]
async fn critical_storage_pauses_devices_until_recovery() {
    let mut rig = SpecRig::new();
    rig.plug("S1", "ONE", &[("a.txt", b"a" as &[u8])]);
    rig.plug("S2", "TWO", &[("b.txt", b"b" as &[u8])]);

    rig.manager.tick().await.unwrap();

    // Storage collapses: every active device pauses.
    rig.probe.set_free(0);
    rig.manager.tick().await.unwrap();

    assert_eq!(rig.state_of("S1"), Some(DeviceState::Paused));
    assert_eq!(rig.state_of("S2"), Some(DeviceState::Paused));
    assert!(rig.manager.has_paused_scanners());
    assert_eq!(rig.events.count(EventKind::StorageLow), 1);

    // Still paused on the next tick; no flapping.
    rig.manager.tick().await.unwrap();
    assert_eq!(rig.state_of("S1"), Some(DeviceState::Paused));

    // Recovery: both devices return to duty.
    rig.probe.set_free(1_000_000_000);
    rig.manager.tick().await.unwrap();

    assert!(matches!(
        rig.state_of("S1"),
        Some(DeviceState::Idle | DeviceState::Scanning)
    ));
    assert!(matches!(
        rig.state_of("S2"),
        Some(DeviceState::Idle | DeviceState::Scanning)
    ));
    assert_eq!(rig.events.count(EventKind::StorageRecovered), 1);

    rig.teardown().await;
}

#[tokio::test]
async fn undersized_free_space_skips_the_copy() {
    let mut rig = SpecRig::new();
    // 31-byte file with 34 bytes free: over the 90% headroom line.
    rig.plug("S1", "VOL", &[("a.bin", &[0u8; 31] as &[u8])]);
    rig.probe.set_free(34);

    rig.manager.tick().await.unwrap();
    rig.settle(|rig| {
        rig.events.all().iter().any(|e| {
            matches!(
                e,
                Event::CopyCompleted {
                    result: CopyResult::Skipped,
                    bytes_copied: 0,
                    ..
                }
            )
        })
    })
    .await;

    assert!(!rig.dest_for("S1", "VOL", "a.bin").exists());
    rig.teardown().await;
}

#[tokio::test]
async fn recycler_reclaims_aged_files_under_pressure() {
    let rig = SpecRig::new();
    let mirror = rig.config.copy.work_path.clone();
    std::fs::create_dir_all(&mirror).unwrap();

    // Three aged mirror files, well past the protection window.
    let old = SystemTime::now() - Duration::from_secs(6 * 3600);
    for (name, len) in [("f1.bin", 100usize), ("f2.bin", 200), ("f3.bin", 300)] {
        let path = mirror.join(name);
        std::fs::write(&path, vec![0u8; len]).unwrap();
        filetime::set_file_mtime(&path, filetime::FileTime::from_system_time(old)).unwrap();
    }

    let recycler = RecyclerService::new(
        Arc::clone(&rig.copy_ctx.storage),
        Arc::clone(&rig.bus),
        Arc::clone(&rig.config),
    );

    rig.probe.set_free(0); // critical → size-first under Auto
    recycler.tick().await.unwrap();

    let recycled = rig.events.all().into_iter().find_map(|e| match e {
        Event::FilesRecycled {
            paths,
            bytes_freed,
            strategy,
        } => Some((paths, bytes_freed, strategy)),
        _ => None,
    });
    let (paths, bytes_freed, strategy) = recycled.expect("expected FilesRecycled");
    assert_eq!(strategy, RecycleStrategy::SizeFirst);
    // All three go: 600 bytes total is far below the 1 MiB floor.
    assert_eq!(paths.len(), 3);
    assert_eq!(bytes_freed, 600);
    assert!(!mirror.join("f3.bin").exists());

    rig.teardown().await;
}

#[tokio::test]
async fn storage_level_classification_is_pure() {
    // free+used == total and level is a function of (free, reserved).
    for (free, reserved, expected) in [
        (0u64, 0u64, StorageLevel::Critical),
        (1, 0, StorageLevel::Ok),
        (1000, 1000, StorageLevel::Critical),
        (1100, 1000, StorageLevel::Low),
        (1101, 1000, StorageLevel::Ok),
    ] {
        assert_eq!(StorageLevel::classify(free, reserved), expected);
    }
}
