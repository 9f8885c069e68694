// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{EngineRig, Events};
use pk_core::EventKind;
use yare::parameterized;

struct RecyclerRig {
    engine: EngineRig,
    service: RecyclerService,
}

impl RecyclerRig {
    fn new(free: u64) -> Self {
        let engine = EngineRig::new(free);
        let service = RecyclerService::new(
            Arc::clone(&engine.ctx.storage),
            Arc::clone(&engine.bus),
            Arc::clone(&engine.ctx.config),
        );
        Self { engine, service }
    }

    fn events(&self) -> &Events {
        &self.engine.events
    }

    /// An aged file in the work tree, outside the protection window.
    fn old_file(&self, name: &str, len: usize) -> std::path::PathBuf {
        let path = self.engine.work.path().join(name);
        std::fs::write(&path, vec![0u8; len]).unwrap();
        let old = SystemTime::now() - Duration::from_secs(3 * 3600);
        filetime::set_file_mtime(&path, filetime::FileTime::from_system_time(old)).unwrap();
        path
    }
}

#[parameterized(
    auto_low_is_time_first = { RecycleStrategy::Auto, StorageLevel::Low, RecycleStrategy::TimeFirst },
    auto_critical_is_size_first = { RecycleStrategy::Auto, StorageLevel::Critical, RecycleStrategy::SizeFirst },
    auto_ok_is_time_first = { RecycleStrategy::Auto, StorageLevel::Ok, RecycleStrategy::TimeFirst },
    fixed_time_stays = { RecycleStrategy::TimeFirst, StorageLevel::Critical, RecycleStrategy::TimeFirst },
    fixed_size_stays = { RecycleStrategy::SizeFirst, StorageLevel::Low, RecycleStrategy::SizeFirst },
)]
fn strategy_resolution(
    configured: RecycleStrategy,
    level: StorageLevel,
    expected: RecycleStrategy,
) {
    assert_eq!(
        RecyclerService::effective_strategy(configured, level),
        expected
    );
}

#[tokio::test]
async fn ok_level_sweeps_empty_directories() {
    let rig = RecyclerRig::new(1_000_000);
    let empty = rig.engine.work.path().join("VOL_S1").join("empty");
    std::fs::create_dir_all(&empty).unwrap();
    rig.old_file("keep.bin", 10);

    rig.service.tick().await.unwrap();

    assert!(!empty.exists());
    // Parent became empty only after this sweep; it goes next tick.
    assert!(empty.parent().unwrap().exists());
    assert_eq!(rig.events().count(EventKind::EmptyFoldersDeleted), 1);
    assert_eq!(rig.events().count(EventKind::FilesRecycled), 0);
}

#[tokio::test]
async fn pressure_recycles_old_files_and_publishes() {
    let rig = RecyclerRig::new(0); // free=0, reserved=0: critical
    rig.old_file("big.bin", 4096);
    rig.old_file("small.bin", 16);

    rig.service.tick().await.unwrap();

    let events = rig.events().all();
    let recycled = events.iter().find_map(|e| match e {
        Event::FilesRecycled {
            paths,
            bytes_freed,
            strategy,
        } => Some((paths.clone(), *bytes_freed, *strategy)),
        _ => None,
    });
    let (paths, bytes_freed, strategy) = recycled.expect("expected FilesRecycled");
    // Critical + Auto: largest first, and 4096+16 < 1 MiB target so both go.
    assert_eq!(strategy, RecycleStrategy::SizeFirst);
    assert!(paths.iter().any(|p| p.ends_with("big.bin")));
    assert_eq!(bytes_freed, 4096 + 16);
}

#[tokio::test]
async fn fresh_files_are_protected_from_recycling() {
    let rig = RecyclerRig::new(0);
    // Freshly written: inside the protected-age window.
    std::fs::write(rig.engine.work.path().join("fresh.bin"), vec![0u8; 64]).unwrap();

    rig.service.tick().await.unwrap();

    assert_eq!(rig.events().count(EventKind::FilesRecycled), 0);
    assert!(rig.engine.work.path().join("fresh.bin").exists());
}

#[tokio::test]
async fn empty_work_tree_is_a_quiet_tick() {
    let rig = RecyclerRig::new(1_000_000);
    rig.service.tick().await.unwrap();
    assert!(rig.events().all().is_empty());
}
