// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded copy worker pool with rejection-aware backpressure.
//!
//! `core_workers` tasks run permanently; while the queue is non-empty the
//! pool grows on demand up to `max_workers`, and extra workers exit after
//! `keep_alive` idle. When the queue is full the pool records the
//! rejection (total and 5-second window, both visible to the load
//! evaluator) and runs the task on the submitter, classic caller-runs.
//! `Rejected` is returned only once shutdown has begun.

use crate::copy::CopyTask;
use parking_lot::Mutex;
use pk_core::config::PoolConfig;
use pk_core::CopyResult;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Rejection-counter window width.
const REJECTION_WINDOW: Duration = Duration::from_secs(5);

/// Orderly-shutdown grace before tasks are cancelled.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(5);

/// Grace after cancellation before workers are abandoned.
const SHUTDOWN_CANCEL: Duration = Duration::from_secs(2);

/// What happened to a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Task waits in the queue for a worker.
    Queued,
    /// Queue was full; the task ran on the submitter.
    RanInline(CopyResult),
    /// Pool is shutting down; the task was not accepted.
    Rejected,
}

struct RejectionWindow {
    started: Instant,
    count: u64,
}

/// Bounded worker pool executing [`CopyTask`]s.
pub struct CopyExecutor {
    this: Weak<CopyExecutor>,
    queue: Mutex<VecDeque<CopyTask>>,
    capacity: usize,
    core_workers: usize,
    max_workers: usize,
    keep_alive: Duration,
    notify: Notify,
    worker_count: AtomicUsize,
    active: AtomicUsize,
    rejected_total: AtomicU64,
    window: Mutex<RejectionWindow>,
    accepting: AtomicBool,
    cancel: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl CopyExecutor {
    pub fn new(config: &PoolConfig) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            queue: Mutex::new(VecDeque::with_capacity(config.task_queue_capacity)),
            capacity: config.task_queue_capacity.max(1),
            core_workers: config.core_workers.max(1),
            max_workers: config.max_workers.max(config.core_workers.max(1)),
            keep_alive: Duration::from_secs(config.keep_alive_seconds),
            notify: Notify::new(),
            worker_count: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            rejected_total: AtomicU64::new(0),
            window: Mutex::new(RejectionWindow {
                started: Instant::now(),
                count: 0,
            }),
            accepting: AtomicBool::new(true),
            cancel: CancellationToken::new(),
            workers: Mutex::new(Vec::new()),
        })
    }

    /// Spawn the permanent core workers.
    pub fn start(&self) {
        for _ in 0..self.core_workers {
            self.spawn_worker(true);
        }
    }

    /// Submit a task. See [`SubmitOutcome`] for the three possible paths.
    pub async fn submit(&self, task: CopyTask) -> SubmitOutcome {
        if !self.accepting.load(Ordering::SeqCst) {
            return SubmitOutcome::Rejected;
        }
        let queued = {
            let mut queue = self.queue.lock();
            if queue.len() < self.capacity {
                queue.push_back(task.clone());
                true
            } else {
                false
            }
        };
        if queued {
            self.notify.notify_one();
            self.maybe_grow();
            return SubmitOutcome::Queued;
        }

        // Saturated: record the pressure, then run on the caller so the
        // producer slows to copy speed.
        self.record_rejection();
        tracing::debug!(source = %task.source().display(), "queue full, running inline");
        let result = task.run(&self.cancel).await;
        SubmitOutcome::RanInline(result)
    }

    /// Enqueue without waking workers; keeps the queue depth stable for
    /// evaluator tests.
    #[cfg(test)]
    pub(crate) fn inject_pending(&self, task: CopyTask, copies: usize) {
        let mut queue = self.queue.lock();
        for _ in 0..copies {
            queue.push_back(task.clone());
        }
    }

    /// Queue depth visible to the load evaluator.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count.load(Ordering::SeqCst)
    }

    pub fn total_rejections(&self) -> u64 {
        self.rejected_total.load(Ordering::SeqCst)
    }

    /// Rejections within the current 5-second window.
    pub fn recent_rejections(&self) -> u64 {
        let window = self.window.lock();
        if window.started.elapsed() > REJECTION_WINDOW {
            0
        } else {
            window.count
        }
    }

    fn record_rejection(&self) {
        self.rejected_total.fetch_add(1, Ordering::SeqCst);
        let mut window = self.window.lock();
        if window.started.elapsed() > REJECTION_WINDOW {
            window.started = Instant::now();
            window.count = 0;
        }
        window.count += 1;
    }

    /// Add an on-demand worker while there is queued work and headroom.
    fn maybe_grow(&self) {
        if self.worker_count.load(Ordering::SeqCst) >= self.max_workers {
            return;
        }
        if self.queue.lock().is_empty() {
            return;
        }
        self.spawn_worker(false);
    }

    fn spawn_worker(&self, core: bool) {
        let Some(pool) = self.this.upgrade() else {
            return;
        };
        self.worker_count.fetch_add(1, Ordering::SeqCst);
        let handle = tokio::spawn(async move {
            pool.worker_loop(core).await;
            pool.worker_count.fetch_sub(1, Ordering::SeqCst);
        });
        self.workers.lock().push(handle);
    }

    async fn worker_loop(&self, core: bool) {
        loop {
            let task = self.queue.lock().pop_front();
            if let Some(task) = task {
                self.active.fetch_add(1, Ordering::SeqCst);
                task.run(&self.cancel).await;
                self.active.fetch_sub(1, Ordering::SeqCst);
                continue;
            }
            if self.cancel.is_cancelled() {
                break;
            }
            if core {
                tokio::select! {
                    _ = self.notify.notified() => {}
                    _ = self.cancel.cancelled() => break,
                }
            } else {
                tokio::select! {
                    _ = self.notify.notified() => {}
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.keep_alive) => break,
                }
            }
        }
    }

    /// Two-phase shutdown: stop intake and drain for up to 5 seconds,
    /// then cancel in-flight work and give workers 2 seconds to exit.
    pub async fn shutdown(&self) {
        self.accepting.store(false, Ordering::SeqCst);

        let drain_deadline = Instant::now() + SHUTDOWN_DRAIN;
        while Instant::now() < drain_deadline {
            if self.pending() == 0 && self.active_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        self.cancel.cancel();
        // Wake idle workers so they observe the cancellation.
        self.notify.notify_waiters();

        let workers: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        let join_all = async {
            for worker in workers {
                let _ = worker.await;
            }
        };
        if tokio::time::timeout(SHUTDOWN_CANCEL, join_all).await.is_err() {
            tracing::warn!("copy workers did not stop within the cancel grace period");
        }

        let dropped = self.queue.lock().len();
        if dropped > 0 {
            tracing::warn!(dropped, "queued copy tasks discarded at shutdown");
        }
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
