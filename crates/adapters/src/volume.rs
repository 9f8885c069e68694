// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Volume enumeration and serial lookup.
//!
//! On Windows the serial comes from a `wmic` query with a PowerShell
//! fallback; results are memoized per root since a volume's serial never
//! changes while mounted. Non-Windows builds scan a mount base directory
//! so the daemon stays developable off-Windows.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("volume query failed for {root}: {reason}")]
    Query { root: PathBuf, reason: String },
    #[error("no serial number reported for {0}")]
    NoSerial(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Identity and filesystem of one mounted volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeInfo {
    pub root: PathBuf,
    pub serial: String,
    pub name: String,
    pub filesystem: String,
}

impl VolumeInfo {
    /// Whether the filesystem type marks this as non-removable user media.
    pub fn is_system_filesystem(&self) -> bool {
        let fs = self.filesystem.to_ascii_uppercase();
        fs != "FAT32" && fs != "EXFAT" && fs != "FAT"
    }
}

/// Source of mounted-volume information.
pub trait VolumeProvider: Send + Sync {
    /// Volume roots currently visible to the filesystem.
    fn roots(&self) -> Vec<PathBuf>;

    /// Metadata for one root. May block on a platform query.
    fn volume_info(&self, root: &Path) -> Result<VolumeInfo, VolumeError>;
}

/// Platform-backed provider with per-root memoization.
#[derive(Default)]
pub struct SystemVolumeProvider {
    cache: Mutex<HashMap<PathBuf, VolumeInfo>>,
    /// Mount base scanned on non-Windows hosts.
    #[cfg_attr(windows, allow(dead_code))]
    mount_base: Option<PathBuf>,
}

impl SystemVolumeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider scanning `base` for mounted volumes (non-Windows hosts).
    pub fn with_mount_base(base: PathBuf) -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            mount_base: Some(base),
        }
    }

    fn cached(&self, root: &Path) -> Option<VolumeInfo> {
        self.cache.lock().get(root).cloned()
    }

    fn remember(&self, info: VolumeInfo) -> VolumeInfo {
        self.cache.lock().insert(info.root.clone(), info.clone());
        info
    }
}

impl VolumeProvider for SystemVolumeProvider {
    #[cfg(windows)]
    fn roots(&self) -> Vec<PathBuf> {
        ('A'..='Z')
            .map(|letter| PathBuf::from(format!("{letter}:\\")))
            .filter(|root| root.exists())
            .collect()
    }

    #[cfg(not(windows))]
    fn roots(&self) -> Vec<PathBuf> {
        let Some(base) = &self.mount_base else {
            return Vec::new();
        };
        let Ok(entries) = std::fs::read_dir(base) else {
            return Vec::new();
        };
        let mut roots: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        roots.sort();
        roots
    }

    #[cfg(windows)]
    fn volume_info(&self, root: &Path) -> Result<VolumeInfo, VolumeError> {
        if let Some(info) = self.cached(root) {
            return Ok(info);
        }
        let info = windows::query(root)?;
        Ok(self.remember(info))
    }

    #[cfg(not(windows))]
    fn volume_info(&self, root: &Path) -> Result<VolumeInfo, VolumeError> {
        if let Some(info) = self.cached(root) {
            return Ok(info);
        }
        let info = unix::query(root)?;
        Ok(self.remember(info))
    }
}

/// Parse `Key=Value` lines as emitted by `wmic ... /format:list`.
#[cfg_attr(not(windows), allow(dead_code))]
fn parse_list_output(output: &str) -> HashMap<String, String> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let (key, value) = line.split_once('=')?;
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(windows)]
mod windows {
    use super::{parse_list_output, VolumeError, VolumeInfo};
    use std::path::Path;
    use std::process::Command;

    /// Query one logical disk, `wmic` first, PowerShell as fallback.
    pub(super) fn query(root: &Path) -> Result<VolumeInfo, VolumeError> {
        let device_id = device_id(root)?;
        match wmic(&device_id) {
            Ok(fields) => build(root, &device_id, fields),
            Err(_) => {
                let fields = powershell(&device_id)?;
                build(root, &device_id, fields)
            }
        }
    }

    fn device_id(root: &Path) -> Result<String, VolumeError> {
        let text = root.to_string_lossy();
        let letter = text.chars().next().filter(|c| c.is_ascii_alphabetic());
        match letter {
            Some(l) => Ok(format!("{}:", l.to_ascii_uppercase())),
            None => Err(VolumeError::Query {
                root: root.to_path_buf(),
                reason: "root is not a drive letter".to_string(),
            }),
        }
    }

    fn wmic(
        device_id: &str,
    ) -> Result<std::collections::HashMap<String, String>, VolumeError> {
        let output = Command::new("wmic")
            .args([
                "logicaldisk",
                "where",
                &format!("DeviceID='{device_id}'"),
                "get",
                "VolumeSerialNumber,VolumeName,FileSystem",
                "/format:list",
            ])
            .output()?;
        if !output.status.success() {
            return Err(VolumeError::Query {
                root: device_id.into(),
                reason: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(parse_list_output(&String::from_utf8_lossy(&output.stdout)))
    }

    fn powershell(
        device_id: &str,
    ) -> Result<std::collections::HashMap<String, String>, VolumeError> {
        let script = format!(
            "$d = Get-CimInstance Win32_LogicalDisk -Filter \"DeviceID='{device_id}'\"; \
             \"VolumeSerialNumber=$($d.VolumeSerialNumber)\"; \
             \"VolumeName=$($d.VolumeName)\"; \
             \"FileSystem=$($d.FileSystem)\""
        );
        let output = Command::new("powershell")
            .args(["-NoProfile", "-NonInteractive", "-Command", &script])
            .output()?;
        if !output.status.success() {
            return Err(VolumeError::Query {
                root: device_id.into(),
                reason: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(parse_list_output(&String::from_utf8_lossy(&output.stdout)))
    }

    fn build(
        root: &Path,
        device_id: &str,
        fields: std::collections::HashMap<String, String>,
    ) -> Result<VolumeInfo, VolumeError> {
        let serial = fields
            .get("VolumeSerialNumber")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| VolumeError::NoSerial(root.to_path_buf()))?;
        Ok(VolumeInfo {
            root: root.to_path_buf(),
            serial: serial.clone(),
            name: fields
                .get("VolumeName")
                .cloned()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| device_id.trim_end_matches(':').to_string()),
            filesystem: fields.get("FileSystem").cloned().unwrap_or_default(),
        })
    }
}

#[cfg(not(windows))]
mod unix {
    use super::{VolumeError, VolumeInfo};
    use std::os::unix::fs::MetadataExt;
    use std::path::Path;

    pub(super) fn query(root: &Path) -> Result<VolumeInfo, VolumeError> {
        let meta = std::fs::metadata(root)?;
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "volume".to_string());
        let filesystem = std::fs::read_to_string("/proc/mounts")
            .ok()
            .and_then(|mounts| filesystem_for(&mounts, root))
            .unwrap_or_default();
        Ok(VolumeInfo {
            root: root.to_path_buf(),
            serial: format!("dev-{}", meta.dev()),
            name,
            filesystem,
        })
    }

    /// Longest-prefix match of `root` against /proc/mounts lines.
    pub(super) fn filesystem_for(mounts: &str, root: &Path) -> Option<String> {
        let mut best: Option<(usize, String)> = None;
        for line in mounts.lines() {
            let mut parts = line.split_whitespace();
            let _device = parts.next()?;
            let mount_point = parts.next()?;
            let fs_type = parts.next()?;
            if root.starts_with(mount_point) {
                let len = mount_point.len();
                if best.as_ref().is_none_or(|(l, _)| len > *l) {
                    best = Some((len, fs_type.to_string()));
                }
            }
        }
        best.map(|(_, fs)| fs)
    }
}

/// In-memory provider for tests: volumes are plugged and unplugged.
#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
pub struct FakeVolumeProvider {
    volumes: Mutex<HashMap<PathBuf, VolumeInfo>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeVolumeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plug(&self, info: VolumeInfo) {
        self.volumes.lock().insert(info.root.clone(), info);
    }

    pub fn unplug(&self, root: &Path) {
        self.volumes.lock().remove(root);
    }
}

#[cfg(any(test, feature = "test-support"))]
impl VolumeProvider for FakeVolumeProvider {
    fn roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = self.volumes.lock().keys().cloned().collect();
        roots.sort();
        roots
    }

    fn volume_info(&self, root: &Path) -> Result<VolumeInfo, VolumeError> {
        self.volumes
            .lock()
            .get(root)
            .cloned()
            .ok_or_else(|| VolumeError::NoSerial(root.to_path_buf()))
    }
}

#[cfg(test)]
#[path = "volume_tests.rs"]
mod tests;
