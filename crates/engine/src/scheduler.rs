// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Priority-based copy scheduling.
//!
//! The scheduler owns the priority queue between the scanners (producers)
//! and the copy executor (consumer). Each tick it reads the load level and
//! dispatches a level-sized batch, or, under High load, nothing at all:
//! accumulation mode lets the pool drain while the queue absorbs the
//! burst, so fresh high-priority work overtakes stale low-priority work.

use crate::copy::CopyTask;
use crate::error::EngineError;
use crate::executor::{CopyExecutor, SubmitOutcome};
use crate::load::LoadSource;
use crate::rate_limiter::RateLimiter;
use crate::service::Service;
use async_trait::async_trait;
use parking_lot::Mutex;
use pk_core::{ConfigHandle, LoadLevel, PriorityTask};
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Periodic service dequeuing into the executor by load level.
pub struct PriorityScheduler {
    queue: Mutex<BinaryHeap<PriorityTask<CopyTask>>>,
    seq: AtomicU64,
    accumulating: AtomicBool,
    executor: Arc<CopyExecutor>,
    load: Arc<dyn LoadSource>,
    rate_limiter: Arc<RateLimiter>,
    config: ConfigHandle,
}

impl PriorityScheduler {
    pub fn new(
        executor: Arc<CopyExecutor>,
        load: Arc<dyn LoadSource>,
        rate_limiter: Arc<RateLimiter>,
        config: ConfigHandle,
    ) -> Self {
        Self {
            queue: Mutex::new(BinaryHeap::new()),
            seq: AtomicU64::new(0),
            accumulating: AtomicBool::new(false),
            executor,
            load,
            rate_limiter,
            config,
        }
    }

    /// Enqueue a task at `priority`. Refused when the queue has hit the
    /// accumulation cap.
    pub fn submit(&self, priority: i32, task: CopyTask) -> Result<(), EngineError> {
        let mut queue = self.queue.lock();
        if queue.len() >= self.config.scheduler.accumulation_max_queue {
            return Err(EngineError::SchedulerFull(queue.len()));
        }
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        queue.push(PriorityTask::new(priority, epoch_ms(), seq, task));
        Ok(())
    }

    pub fn queued(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_accumulating(&self) -> bool {
        self.accumulating.load(Ordering::SeqCst)
    }

    /// Dispatch up to `batch` tasks in priority order. Executor rejection
    /// re-inserts the task and ends the batch; the task retries next tick.
    async fn dispatch_batch(&self, batch: usize) -> usize {
        let mut dispatched = 0;
        while dispatched < batch {
            let Some(task) = self.queue.lock().pop() else {
                break;
            };
            match self.executor.submit(task.inner().clone()).await {
                SubmitOutcome::Queued | SubmitOutcome::RanInline(_) => {
                    dispatched += 1;
                }
                SubmitOutcome::Rejected => {
                    // Keep priority and creation time for the retry.
                    self.queue.lock().push(task);
                    break;
                }
            }
        }
        dispatched
    }
}

fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[async_trait]
impl Service for PriorityScheduler {
    fn name(&self) -> &'static str {
        "scheduler"
    }

    fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.config.scheduler.tick_interval_ms)
    }

    async fn tick(&self) -> Result<(), EngineError> {
        let level = self.load.evaluate().level();
        match level {
            LoadLevel::High => {
                if !self.accumulating.swap(true, Ordering::SeqCst) {
                    tracing::info!(
                        queued = self.queued(),
                        "high load, entering accumulation mode"
                    );
                }
            }
            LoadLevel::Medium | LoadLevel::Low => {
                if self.accumulating.swap(false, Ordering::SeqCst) {
                    tracing::info!(queued = self.queued(), "load eased, resuming dispatch");
                }
                let batch = match level {
                    LoadLevel::Medium => self.config.scheduler.medium_batch,
                    _ => self.config.scheduler.low_batch,
                };
                self.dispatch_batch(batch).await;
            }
        }
        self.rate_limiter.adjust_by_load_level(level);
        Ok(())
    }

    /// Best-effort drain into the executor.
    async fn cleanup(&self) -> Result<(), EngineError> {
        let remaining = self.queued();
        if remaining > 0 {
            tracing::info!(remaining, "draining scheduler queue");
            self.dispatch_batch(usize::MAX).await;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
