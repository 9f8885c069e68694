// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pk_core::DeviceSerial;

fn record(serial: &str, name: &str) -> DeviceRecord {
    DeviceRecord::new(DeviceSerial::new(serial), name)
}

#[test]
fn blob_round_trips() {
    let records = vec![record("S1", "ALPHA"), record("S2", "BETA")];
    let blob = encode_blob(&records);
    assert_eq!(blob, "S1::ALPHA||S2::BETA");
    assert_eq!(parse_blob(&blob), records);
}

#[test]
fn empty_blob_parses_to_nothing() {
    assert!(parse_blob("").is_empty());
}

#[test]
fn malformed_tokens_are_skipped() {
    let parsed = parse_blob("S1::ALPHA||garbage||::noserial||S2::BETA");
    assert_eq!(parsed, vec![record("S1", "ALPHA"), record("S2", "BETA")]);
}

#[test]
fn file_store_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileRecordStore::new(dir.path().join("nested").join("device_records"));

    assert_eq!(store.load_blob().unwrap(), None);

    store.store_blob("S1::ALPHA").unwrap();
    assert_eq!(store.load_blob().unwrap().as_deref(), Some("S1::ALPHA"));

    store.store_blob("S1::ALPHA||S2::BETA").unwrap();
    assert_eq!(
        store.load_blob().unwrap().as_deref(),
        Some("S1::ALPHA||S2::BETA")
    );
}

#[test]
fn clear_removes_the_blob() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileRecordStore::new(dir.path().join("device_records"));

    store.store_blob("S1::A").unwrap();
    store.clear().unwrap();
    assert_eq!(store.load_blob().unwrap(), None);

    // Clearing an already-empty store is fine.
    store.clear().unwrap();
}

#[test]
fn memory_store_behaves_like_file_store() {
    let store = MemoryRecordStore::new();
    assert_eq!(store.load_blob().unwrap(), None);
    store.store_blob("S::V").unwrap();
    assert_eq!(store.load_blob().unwrap().as_deref(), Some("S::V"));
    store.clear().unwrap();
    assert_eq!(store.load_blob().unwrap(), None);
}
