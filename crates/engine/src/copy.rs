// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The copy task: one source path mirrored into the work directory.
//!
//! Every run publishes exactly one `CopyCompleted` event, whatever the
//! outcome. The copy stream checks cancellation per buffer and a Success
//! computed before a late cancellation is downgraded to Cancel, so an
//! interrupted pool never reports clean completions.

use crate::bus::EventBus;
use crate::rate_limiter::RateLimiter;
use crate::speed::{ProbeGroup, SpeedProbe};
use pk_adapters::attrs;
use pk_adapters::{hash_file, FileIndex};
use pk_core::{ConfigHandle, CopyResult, DeviceHandle, Event};
use pk_storage::StorageController;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// Shared collaborators every copy task needs.
pub struct CopyContext {
    pub config: ConfigHandle,
    pub storage: Arc<StorageController>,
    pub index: Arc<dyn FileIndex>,
    pub rate_limiter: Arc<RateLimiter>,
    pub bus: Arc<EventBus>,
    pub probes: Arc<ProbeGroup>,
    pub global_probe: Arc<SpeedProbe>,
}

/// Throughput log cadence.
const LOG_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Default)]
struct Outcome {
    destination: Option<PathBuf>,
    size: u64,
    bytes_copied: u64,
}

/// One mirroring unit of work.
#[derive(Clone)]
pub struct CopyTask {
    source: PathBuf,
    device: DeviceHandle,
    ctx: Arc<CopyContext>,
}

impl CopyTask {
    pub fn new(source: PathBuf, device: DeviceHandle, ctx: Arc<CopyContext>) -> Self {
        Self {
            source,
            device,
            ctx,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn device(&self) -> &DeviceHandle {
        &self.device
    }

    /// Destination under the work directory:
    /// `<work>/<volume_name>_<serial>/<relative-from-root>`.
    pub fn destination(&self) -> PathBuf {
        let relative = self
            .source
            .strip_prefix(&self.device.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| {
                PathBuf::from(self.source.file_name().unwrap_or(self.source.as_os_str()))
            });
        self.ctx
            .config
            .copy
            .work_path
            .join(self.device.work_dir_name())
            .join(relative)
    }

    /// Run the copy and publish its completion event.
    pub async fn run(&self, cancel: &CancellationToken) -> CopyResult {
        let mut outcome = Outcome::default();
        let result = self.execute(cancel, &mut outcome).await;
        // A Success computed before a late cancellation is not trusted.
        let result = if result == CopyResult::Success && cancel.is_cancelled() {
            CopyResult::Cancel
        } else {
            result
        };
        self.ctx.bus.dispatch(&Event::CopyCompleted {
            source: self.source.clone(),
            destination: outcome.destination,
            size: outcome.size,
            bytes_copied: outcome.bytes_copied,
            result,
            serial: self.device.serial.clone(),
        });
        result
    }

    async fn execute(&self, cancel: &CancellationToken, outcome: &mut Outcome) -> CopyResult {
        if self.ctx.storage.is_critical() {
            tracing::debug!(source = %self.source.display(), "skipping copy, storage critical");
            return CopyResult::Skipped;
        }

        let meta = match tokio::fs::metadata(&self.source).await {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!(source = %self.source.display(), error = %e, "source stat failed");
                return CopyResult::Fail;
            }
        };

        let destination = self.destination();
        outcome.destination = Some(destination.clone());

        if meta.is_dir() {
            return match tokio::fs::create_dir_all(&destination).await {
                Ok(()) => CopyResult::Success,
                Err(e) => {
                    tracing::warn!(dest = %destination.display(), error = %e, "mkdir failed");
                    CopyResult::Fail
                }
            };
        }

        let size = meta.len();
        outcome.size = size;

        // 10% headroom: a file exactly at free*0.9 still fits.
        let free = self.ctx.storage.status().free_bytes;
        if size as u128 * 10 > free as u128 * 9 {
            tracing::info!(
                source = %self.source.display(),
                size,
                free,
                "skipping copy, insufficient headroom"
            );
            return CopyResult::Skipped;
        }

        let hash_source = self.source.clone();
        let hash = match tokio::task::spawn_blocking(move || hash_file(&hash_source)).await {
            Ok(Ok(hash)) => hash,
            Ok(Err(e)) => {
                tracing::warn!(source = %self.source.display(), error = %e, "hashing failed");
                return CopyResult::Fail;
            }
            Err(e) => {
                tracing::warn!(source = %self.source.display(), error = %e, "hash task failed");
                return CopyResult::Fail;
            }
        };
        if cancel.is_cancelled() {
            return CopyResult::Cancel;
        }

        if self.ctx.index.check_duplicate(&self.source, &hash) {
            // Already mirrored somewhere: count the bytes, write nothing.
            outcome.bytes_copied = size;
            return CopyResult::Success;
        }

        match self.stream(cancel, &destination, outcome).await {
            Ok(result) => {
                if result == CopyResult::Success {
                    self.finish(&destination, &hash, size);
                }
                result
            }
            Err(e) => {
                tracing::warn!(
                    source = %self.source.display(),
                    dest = %destination.display(),
                    error = %e,
                    "copy failed"
                );
                CopyResult::Fail
            }
        }
    }

    /// Chunked read/write with per-buffer accounting, rate limiting, and
    /// cancellation checks.
    async fn stream(
        &self,
        cancel: &CancellationToken,
        destination: &Path,
        outcome: &mut Outcome,
    ) -> std::io::Result<CopyResult> {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut reader = tokio::fs::File::open(&self.source).await?;
        let mut writer = tokio::fs::File::create(destination).await?;

        let probe = SpeedProbe::new();
        self.ctx.probes.register(&probe);

        let mut buffer = vec![0u8; self.ctx.config.copy.buffer_size.max(1)];
        let mut last_log = Instant::now();
        loop {
            if cancel.is_cancelled() {
                return Ok(CopyResult::Cancel);
            }
            let read = reader.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            writer.write_all(&buffer[..read]).await?;
            outcome.bytes_copied += read as u64;
            probe.record(read as u64);
            self.ctx.global_probe.record(read as u64);
            self.ctx.rate_limiter.acquire(read as u64).await;

            if last_log.elapsed() >= LOG_INTERVAL {
                tracing::debug!(
                    source = %self.source.display(),
                    copied = outcome.bytes_copied,
                    aggregate_mbps = self.ctx.global_probe.speed_mbps(),
                    "copy in progress"
                );
                last_log = Instant::now();
            }
        }
        writer.flush().await?;
        Ok(CopyResult::Success)
    }

    /// Post-copy bookkeeping: attributes best-effort, then the index.
    fn finish(&self, destination: &Path, hash: &str, size: u64) {
        if let Err(e) = attrs::copy_file_times(&self.source, destination) {
            tracing::debug!(dest = %destination.display(), error = %e, "timestamp copy failed");
        }
        if let Err(e) = attrs::copy_readonly(&self.source, destination) {
            tracing::debug!(dest = %destination.display(), error = %e, "readonly copy failed");
        }
        self.ctx.index.add_file(hash, &self.source, size);
    }
}

#[cfg(test)]
#[path = "copy_tests.rs"]
mod tests;
