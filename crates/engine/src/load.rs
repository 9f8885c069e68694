// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Composite load evaluation.
//!
//! Four normalized signals (executor queue depth, global copy speed,
//! worker activity, recent rejections) are blended into a 0..=100
//! score. The result is cached briefly so `evaluate()` stays non-blocking
//! on the scheduler tick path, and every sampling failure substitutes a
//! conservative default instead of erroring.

use crate::executor::CopyExecutor;
use crate::speed::ProbeGroup;
use parking_lot::Mutex;
use pk_core::config::LoadConfig;
use pk_core::LoadScore;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Anything that yields a current load score. The scheduler depends on
/// this seam so tests can pin the level.
pub trait LoadSource: Send + Sync {
    fn evaluate(&self) -> LoadScore;
}

struct CachedScore {
    at: Instant,
    score: LoadScore,
}

/// Production evaluator sampling the executor and the global probe group.
pub struct LoadEvaluator {
    executor: Arc<CopyExecutor>,
    probes: Arc<ProbeGroup>,
    config: LoadConfig,
    cache: Mutex<Option<CachedScore>>,
}

/// Conservative fallback when no copy is live to measure.
const DEFAULT_SPEED_MBPS: f64 = 10.0;

/// Conservative fallback for worker activity.
const DEFAULT_ACTIVITY: f64 = 0.5;

impl LoadEvaluator {
    pub fn new(executor: Arc<CopyExecutor>, probes: Arc<ProbeGroup>, config: LoadConfig) -> Self {
        Self {
            executor,
            probes,
            config,
            cache: Mutex::new(None),
        }
    }

    fn compute(&self) -> LoadScore {
        let queue_score = (self.executor.pending() as u32).min(100);

        let speed = self
            .probes
            .total_speed_mbps()
            .unwrap_or(DEFAULT_SPEED_MBPS);
        let speed_score = speed_to_score(speed);

        let max_workers = self.executor.max_workers();
        let activity = if max_workers == 0 {
            DEFAULT_ACTIVITY
        } else {
            self.executor.active_count() as f64 / max_workers as f64
        };
        let activity_score = (activity * 100.0).clamp(0.0, 100.0) as u32;

        let rejection_score = (self.executor.recent_rejections() as u32).min(100);

        let c = &self.config;
        let weight_sum = c.queue_weight + c.speed_weight + c.activity_weight + c.rejection_weight;
        let weighted = queue_score * c.queue_weight
            + speed_score * c.speed_weight
            + activity_score * c.activity_weight
            + rejection_score * c.rejection_weight;
        let score = if weight_sum == 0 {
            0
        } else {
            weighted / weight_sum
        };

        LoadScore::from_thresholds(score, c.low_threshold, c.high_threshold)
    }
}

impl LoadSource for LoadEvaluator {
    fn evaluate(&self) -> LoadScore {
        let mut cache = self.cache.lock();
        let fresh_for = Duration::from_millis(self.config.cache_ms);
        if let Some(cached) = cache.as_ref() {
            if cached.at.elapsed() <= fresh_for {
                return cached.score;
            }
        }
        let score = self.compute();
        *cache = Some(CachedScore {
            at: Instant::now(),
            score,
        });
        score
    }
}

/// `>= 10 MB/s` is no pressure, `< 1 MB/s` is full pressure, linear in
/// between.
fn speed_to_score(mbps: f64) -> u32 {
    if mbps >= 10.0 {
        0
    } else if mbps < 1.0 {
        100
    } else {
        (((10.0 - mbps) / 9.0) * 100.0).round().clamp(0.0, 100.0) as u32
    }
}

/// Fixed-level source for tests and manual overrides.
pub struct FixedLoad(pub LoadScore);

impl FixedLoad {
    pub fn level(level: pk_core::LoadLevel) -> Arc<Self> {
        let score = match level {
            pk_core::LoadLevel::Low => 0,
            pk_core::LoadLevel::Medium => 50,
            pk_core::LoadLevel::High => 100,
        };
        Arc::new(Self(LoadScore::from_thresholds(score, 40, 70)))
    }
}

impl LoadSource for FixedLoad {
    fn evaluate(&self) -> LoadScore {
        self.0
    }
}

#[cfg(test)]
#[path = "load_tests.rs"]
mod tests;
