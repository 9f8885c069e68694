// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Throughput probes.
//!
//! [`SpeedProbe::record`] is on the copy hot path: bytes land in an atomic
//! running total and a pending accumulator that merges into the sample
//! window at most once per millisecond, so per-buffer recording stays
//! contention-free. A [`ProbeGroup`] holds weak references to the live
//! probes and sums their smoothed speeds for the load evaluator.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Sliding-window sample slots.
const WINDOW_SLOTS: usize = 10;

/// Minimum interval between merges into the window.
const MERGE_INTERVAL: Duration = Duration::from_millis(1);

/// Samples older than this no longer contribute to the speed.
const STALE_AFTER: Duration = Duration::from_secs(10);

struct SampleWindow {
    samples: VecDeque<(Instant, u64)>,
    pending: u64,
    last_merge: Instant,
}

/// Records bytes moved for one source and yields a smoothed MB/s.
pub struct SpeedProbe {
    total: AtomicU64,
    window: Mutex<SampleWindow>,
}

impl SpeedProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            total: AtomicU64::new(0),
            window: Mutex::new(SampleWindow {
                samples: VecDeque::with_capacity(WINDOW_SLOTS),
                pending: 0,
                last_merge: Instant::now(),
            }),
        })
    }

    /// Record bytes moved. Cheap enough to call per buffer.
    pub fn record(&self, bytes: u64) {
        self.total.fetch_add(bytes, Ordering::Relaxed);
        let mut window = self.window.lock();
        window.pending += bytes;
        let now = Instant::now();
        if now.duration_since(window.last_merge) >= MERGE_INTERVAL {
            let sample = (now, window.pending);
            window.pending = 0;
            window.last_merge = now;
            if window.samples.len() == WINDOW_SLOTS {
                window.samples.pop_front();
            }
            window.samples.push_back(sample);
        }
    }

    /// Total bytes recorded over the probe's lifetime.
    pub fn total_bytes(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Smoothed MB/s over the sample window; zero when idle or stale.
    pub fn speed_mbps(&self) -> f64 {
        let now = Instant::now();
        let mut window = self.window.lock();
        while let Some((at, _)) = window.samples.front() {
            if now.duration_since(*at) > STALE_AFTER {
                window.samples.pop_front();
            } else {
                break;
            }
        }
        let Some((oldest, _)) = window.samples.front() else {
            return 0.0;
        };
        let elapsed = now.duration_since(*oldest).as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        let bytes: u64 = window.samples.iter().map(|(_, b)| b).sum();
        bytes as f64 / (1024.0 * 1024.0) / elapsed
    }
}

/// Weak collection of live probes; dead entries are pruned lazily.
#[derive(Default)]
pub struct ProbeGroup {
    probes: Mutex<Vec<Weak<SpeedProbe>>>,
}

impl ProbeGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, probe: &Arc<SpeedProbe>) {
        self.probes.lock().push(Arc::downgrade(probe));
    }

    /// Sum of active probe speeds. `None` when no probe is alive, so the
    /// caller can substitute its conservative default.
    pub fn total_speed_mbps(&self) -> Option<f64> {
        let mut probes = self.probes.lock();
        probes.retain(|weak| weak.strong_count() > 0);
        if probes.is_empty() {
            return None;
        }
        let sum = probes
            .iter()
            .filter_map(Weak::upgrade)
            .map(|probe| probe.speed_mbps())
            .sum();
        Some(sum)
    }

    pub fn len(&self) -> usize {
        let mut probes = self.probes.lock();
        probes.retain(|weak| weak.strong_count() > 0);
        probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "speed_tests.rs"]
mod tests;
