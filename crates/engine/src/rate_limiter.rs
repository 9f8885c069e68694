// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token-bucket rate limiter for the copy path.
//!
//! The bucket refills in whole-second steps; `acquire` sleeps
//! `ceil(deficit/rate)` seconds when tokens run short and re-reads the
//! rate on every pass so `set_rate_limit` takes effect for in-flight
//! waiters. The rate field is atomic so getters and setters never touch
//! the bucket lock.

use crate::speed::SpeedProbe;
use parking_lot::Mutex;
use pk_core::config::{CopyConfig, RateLimiterConfig};
use pk_core::LoadLevel;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::time::{Duration, Instant};

struct Bucket {
    tokens: u64,
    last_refill: Instant,
}

struct AdjustState {
    /// When load was first observed Low while the rate sat below base.
    low_since: Option<Instant>,
}

/// Byte-per-second token bucket with load-aware adjustment.
pub struct RateLimiter {
    rate: AtomicI64,
    burst: u64,
    base_rate: i64,
    medium_percent: u32,
    high_percent: u32,
    raise_hold: Duration,
    bucket: Mutex<Bucket>,
    adjust: Mutex<AdjustState>,
    probe: Option<Arc<SpeedProbe>>,
}

impl RateLimiter {
    pub fn new(copy: &CopyConfig, limiter: &RateLimiterConfig) -> Self {
        Self {
            rate: AtomicI64::new(copy.rate_limit),
            burst: copy.rate_burst_size.max(1),
            base_rate: copy.rate_limit_base,
            medium_percent: limiter.medium_load_percent,
            high_percent: limiter.high_load_percent,
            raise_hold: Duration::from_secs(limiter.raise_hold_secs),
            bucket: Mutex::new(Bucket {
                tokens: copy.rate_burst_size.max(1),
                last_refill: Instant::now(),
            }),
            adjust: Mutex::new(AdjustState { low_since: None }),
            probe: None,
        }
    }

    /// Attach a speed probe fed after each successful acquire.
    pub fn with_probe(mut self, probe: Arc<SpeedProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn rate(&self) -> i64 {
        self.rate.load(Ordering::SeqCst)
    }

    pub fn burst(&self) -> u64 {
        self.burst
    }

    pub fn set_rate_limit(&self, rate: i64) {
        self.rate.store(rate, Ordering::SeqCst);
    }

    /// Block until `bytes` tokens are available. Returns immediately when
    /// limiting is disabled (`rate <= 0`) or `bytes` is zero.
    pub async fn acquire(&self, bytes: u64) {
        if bytes == 0 {
            return;
        }
        // Requests larger than the bucket can hold are capped at burst so
        // they cannot stall forever.
        let need = bytes.min(self.burst);
        loop {
            let rate = self.rate();
            if rate <= 0 {
                return;
            }
            let wait = {
                let mut bucket = self.bucket.lock();
                refill(&mut bucket, rate as u64, self.burst);
                if bucket.tokens >= need {
                    bucket.tokens -= need;
                    None
                } else {
                    let deficit = need - bucket.tokens;
                    Some(Duration::from_secs(deficit.div_ceil(rate as u64).max(1)))
                }
            };
            match wait {
                None => {
                    if let Some(probe) = &self.probe {
                        probe.record(bytes);
                    }
                    return;
                }
                Some(delay) => tokio::time::sleep(delay).await,
            }
        }
    }

    /// Scale the base rate by the per-level percentage. Reductions apply
    /// immediately; the raise back to base applies only after load has
    /// stayed Low for the configured hold.
    pub fn adjust_by_load_level(&self, level: LoadLevel) {
        let current = self.rate();
        let base = if self.base_rate > 0 {
            self.base_rate
        } else {
            current
        };
        if base <= 0 {
            // Unlimited and no configured base: nothing to scale.
            return;
        }
        let percent = match level {
            LoadLevel::Low => 100,
            LoadLevel::Medium => self.medium_percent,
            LoadLevel::High => self.high_percent,
        };
        let target = base.saturating_mul(percent as i64) / 100;

        let mut adjust = self.adjust.lock();
        match level {
            LoadLevel::Low => {
                if current <= 0 {
                    // Coming from unlimited: applying the base is allowed
                    // immediately under the downward-only rule.
                    adjust.low_since = None;
                    self.set_rate_limit(target);
                    return;
                }
                if target <= current {
                    adjust.low_since = None;
                    return;
                }
                let now = Instant::now();
                let since = *adjust.low_since.get_or_insert(now);
                if now.duration_since(since) >= self.raise_hold {
                    tracing::info!(rate = target, "raising rate limit back to base");
                    self.set_rate_limit(target);
                    adjust.low_since = None;
                }
            }
            LoadLevel::Medium | LoadLevel::High => {
                adjust.low_since = None;
                if target < current || current <= 0 {
                    tracing::info!(%level, rate = target, "reducing rate limit for load");
                    self.set_rate_limit(target);
                }
            }
        }
    }
}

fn refill(bucket: &mut Bucket, rate: u64, burst: u64) {
    let elapsed_s = bucket.last_refill.elapsed().as_secs();
    if elapsed_s == 0 {
        return;
    }
    bucket.tokens = bucket
        .tokens
        .saturating_add(elapsed_s.saturating_mul(rate))
        .min(burst);
    bucket.last_refill += Duration::from_secs(elapsed_s);
}

#[cfg(test)]
#[path = "rate_limiter_tests.rs"]
mod tests;
