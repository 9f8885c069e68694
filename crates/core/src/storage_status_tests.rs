// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    at_reserve_is_critical = { 1000, 1000, StorageLevel::Critical },
    below_reserve_is_critical = { 999, 1000, StorageLevel::Critical },
    zero_free_is_critical = { 0, 1000, StorageLevel::Critical },
    just_above_reserve_is_low = { 1001, 1000, StorageLevel::Low },
    at_low_watermark_is_low = { 1100, 1000, StorageLevel::Low },
    above_low_watermark_is_ok = { 1101, 1000, StorageLevel::Ok },
    plenty_is_ok = { 50_000, 1000, StorageLevel::Ok },
)]
fn classify(free: u64, reserved: u64, expected: StorageLevel) {
    assert_eq!(StorageLevel::classify(free, reserved), expected);
}

#[test]
fn free_plus_used_equals_total() {
    let status = StorageStatus::new(300, 1000, 100);
    assert_eq!(status.free_bytes + status.used_bytes, status.total_bytes);
    assert_eq!(status.level, StorageLevel::Ok);
}

#[test]
fn unavailable_is_critical() {
    let status = StorageStatus::unavailable();
    assert!(status.is_critical());
    assert_eq!(status.total_bytes, 0);
}

#[test]
fn strategy_serde_uses_snake_case() {
    let json = serde_json::to_string(&RecycleStrategy::TimeFirst).unwrap();
    assert_eq!(json, "\"time_first\"");
}
