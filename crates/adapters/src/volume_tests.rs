// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn parse_list_output_extracts_fields() {
    let output = "\r\nFileSystem=FAT32\r\nVolumeName=KINGSTON\r\nVolumeSerialNumber=1A2B3C4D\r\n";
    let fields = parse_list_output(output);

    assert_eq!(fields.get("FileSystem").map(String::as_str), Some("FAT32"));
    assert_eq!(
        fields.get("VolumeSerialNumber").map(String::as_str),
        Some("1A2B3C4D")
    );
}

#[test]
fn parse_list_output_skips_malformed_lines() {
    let fields = parse_list_output("garbage\n=nokey\nKey=Value\n");
    assert_eq!(fields.len(), 1);
    assert_eq!(fields.get("Key").map(String::as_str), Some("Value"));
}

#[parameterized(
    fat32_is_removable = { "FAT32", false },
    exfat_is_removable = { "exFAT", false },
    fat_is_removable = { "FAT", false },
    ntfs_is_system = { "NTFS", true },
    refs_is_system = { "ReFS", true },
    ext4_is_system = { "ext4", true },
    empty_is_system = { "", true },
)]
fn system_filesystem_classification(filesystem: &str, expected: bool) {
    let info = VolumeInfo {
        root: PathBuf::from("E:\\"),
        serial: "S".into(),
        name: "V".into(),
        filesystem: filesystem.into(),
    };
    assert_eq!(info.is_system_filesystem(), expected);
}

#[test]
fn fake_provider_plug_unplug() {
    let provider = FakeVolumeProvider::new();
    assert!(provider.roots().is_empty());

    let info = VolumeInfo {
        root: PathBuf::from("/mnt/stick"),
        serial: "S1".into(),
        name: "STICK".into(),
        filesystem: "FAT32".into(),
    };
    provider.plug(info.clone());

    assert_eq!(provider.roots(), vec![PathBuf::from("/mnt/stick")]);
    assert_eq!(provider.volume_info(Path::new("/mnt/stick")).unwrap(), info);

    provider.unplug(Path::new("/mnt/stick"));
    assert!(provider.roots().is_empty());
    assert!(provider.volume_info(Path::new("/mnt/stick")).is_err());
}

#[cfg(not(windows))]
#[test]
fn filesystem_for_prefers_longest_mount_prefix() {
    let mounts = "\
/dev/sda1 / ext4 rw 0 0
/dev/sdb1 /media vfat rw 0 0
/dev/sdc1 /media/usb exfat rw 0 0
";
    let fs = unix::filesystem_for(mounts, Path::new("/media/usb/photos"));
    assert_eq!(fs.as_deref(), Some("exfat"));
}

#[cfg(not(windows))]
#[test]
fn system_provider_scans_mount_base() {
    let base = tempfile::tempdir().unwrap();
    std::fs::create_dir(base.path().join("usb0")).unwrap();
    std::fs::write(base.path().join("not-a-dir"), b"x").unwrap();

    let provider = SystemVolumeProvider::with_mount_base(base.path().to_path_buf());
    let roots = provider.roots();
    assert_eq!(roots, vec![base.path().join("usb0")]);

    let info = provider.volume_info(&roots[0]).unwrap();
    assert!(info.serial.starts_with("dev-"));
    assert_eq!(info.name, "usb0");

    // Second query is served from the memo cache.
    let again = provider.volume_info(&roots[0]).unwrap();
    assert_eq!(again, info);
}
