//! Load-driven scheduling behavior.

use crate::prelude::SpecRig;
use pk_core::{DeviceHandle, DeviceSerial, LoadLevel, PriorityTask};
use pk_engine::{CopyTask, Service};
use std::collections::BinaryHeap;
use std::sync::Arc;

fn loose_task(rig: &SpecRig, name: &str) -> CopyTask {
    let device = DeviceHandle {
        serial: DeviceSerial::new("Q"),
        root: rig.work.path().to_path_buf(),
        volume_name: "Q".into(),
    };
    CopyTask::new(
        rig.work.path().join(name),
        device,
        Arc::clone(&rig.copy_ctx),
    )
}

#[tokio::test]
async fn high_load_accumulates_then_medium_drains_fifty() {
    let rig = SpecRig::new();
    rig.load.set(LoadLevel::High);

    // 120 tasks submitted across two ticks.
    for i in 0..60 {
        rig.scheduler
            .submit(5, loose_task(&rig, &format!("a{i}")))
            .unwrap();
    }
    rig.scheduler.tick().await.unwrap();
    for i in 0..60 {
        rig.scheduler
            .submit(5, loose_task(&rig, &format!("b{i}")))
            .unwrap();
    }
    rig.scheduler.tick().await.unwrap();

    // Accumulation: nothing reached the executor.
    assert!(rig.scheduler.is_accumulating());
    assert_eq!(rig.scheduler.queued(), 120);
    assert_eq!(rig.executor.pending(), 0);

    // Load eases to Medium: exactly one batch of 50 moves.
    rig.load.set(LoadLevel::Medium);
    rig.scheduler.tick().await.unwrap();

    assert!(!rig.scheduler.is_accumulating());
    assert_eq!(rig.scheduler.queued(), 70);

    rig.teardown().await;
}

#[test]
fn dequeue_order_is_priority_desc_then_fifo() {
    // Mixed submission order: T(10, t=1), T(5, t=0), T(10, t=0).
    let mut heap = BinaryHeap::new();
    heap.push(PriorityTask::new(10, 1, 0, "later-high"));
    heap.push(PriorityTask::new(5, 0, 1, "low"));
    heap.push(PriorityTask::new(10, 0, 2, "early-high"));

    assert_eq!(*heap.pop().unwrap().inner(), "early-high");
    assert_eq!(*heap.pop().unwrap().inner(), "later-high");
    assert_eq!(*heap.pop().unwrap().inner(), "low");
}

#[tokio::test]
async fn rate_limit_steps_down_with_load_and_recovers_after_hold() {
    let rig = SpecRig::with_config(|config| {
        config.copy.rate_limit = 1_000;
        config.copy.rate_limit_base = 1_000;
        config.rate_limiter.raise_hold_secs = 0;
    });

    rig.load.set(LoadLevel::High);
    rig.scheduler.tick().await.unwrap();
    assert_eq!(rig.copy_ctx.rate_limiter.rate(), 400);

    rig.load.set(LoadLevel::Medium);
    rig.scheduler.tick().await.unwrap();
    // Downward-only outside Low: 700 > 400 is not applied.
    assert_eq!(rig.copy_ctx.rate_limiter.rate(), 400);

    // With a zero hold the first Low tick restores the base.
    rig.load.set(LoadLevel::Low);
    rig.scheduler.tick().await.unwrap();
    assert_eq!(rig.copy_ctx.rate_limiter.rate(), 1_000);

    rig.teardown().await;
}
