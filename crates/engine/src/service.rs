// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Uniform service lifecycle and tick scheduling.
//!
//! Every long-running component implements [`Service`]; a [`ServiceHandle`]
//! drives its ticks on a tokio task with fixed delay and owns the state
//! machine `Stopped → Starting → Running → Stopping → Stopped` (plus
//! `Paused` and `Failed`). A tick error parks the service in `Failed`
//! without affecting any other service.

use crate::error::EngineError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Lifecycle state of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Stopped,
    Starting,
    Running,
    Paused,
    Stopping,
    Failed,
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ServiceState::Stopped => "stopped",
            ServiceState::Starting => "starting",
            ServiceState::Running => "running",
            ServiceState::Paused => "paused",
            ServiceState::Stopping => "stopping",
            ServiceState::Failed => "failed",
        })
    }
}

/// A periodically-ticked component.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn tick_interval(&self) -> Duration;

    /// One periodic body. An error fails the service.
    async fn tick(&self) -> Result<(), EngineError>;

    /// Invoked by `stop()` after the tick subscription is cancelled.
    async fn cleanup(&self) -> Result<(), EngineError> {
        Ok(())
    }
}

struct Ticker {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

/// Drives one service's lifecycle.
pub struct ServiceHandle {
    service: Arc<dyn Service>,
    state: Arc<Mutex<ServiceState>>,
    ticker: Mutex<Option<Ticker>>,
}

impl ServiceHandle {
    pub fn new(service: Arc<dyn Service>) -> Self {
        Self {
            service,
            state: Arc::new(Mutex::new(ServiceState::Stopped)),
            ticker: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        self.service.name()
    }

    pub fn state(&self) -> ServiceState {
        *self.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.state() == ServiceState::Running
    }

    pub fn is_failed(&self) -> bool {
        self.state() == ServiceState::Failed
    }

    pub fn status_string(&self) -> String {
        format!(
            "{}: {} (tick every {}ms)",
            self.name(),
            self.state(),
            self.service.tick_interval().as_millis()
        )
    }

    /// Start ticking. Only valid from `Stopped`.
    pub fn start(&self) {
        {
            let mut state = self.state.lock();
            if *state != ServiceState::Stopped {
                tracing::warn!(service = self.name(), state = %state, "start ignored");
                return;
            }
            *state = ServiceState::Starting;
        }
        self.spawn_ticker();
        *self.state.lock() = ServiceState::Running;
        tracing::info!(service = self.name(), "started");
    }

    /// Cancel the tick subscription without running cleanup.
    pub fn pause(&self) {
        {
            let mut state = self.state.lock();
            if *state != ServiceState::Running {
                tracing::warn!(service = self.name(), state = %state, "pause ignored");
                return;
            }
            *state = ServiceState::Paused;
        }
        self.cancel_ticker();
        tracing::info!(service = self.name(), "paused");
    }

    /// Re-subscribe a paused service.
    pub fn resume(&self) {
        {
            let mut state = self.state.lock();
            if *state != ServiceState::Paused {
                tracing::warn!(service = self.name(), state = %state, "resume ignored");
                return;
            }
            *state = ServiceState::Running;
        }
        self.spawn_ticker();
        tracing::info!(service = self.name(), "resumed");
    }

    /// Cancel ticking, run cleanup, and settle in `Stopped` (or `Failed`
    /// when cleanup errors).
    pub async fn stop(&self) {
        {
            let mut state = self.state.lock();
            match *state {
                ServiceState::Stopped | ServiceState::Stopping => return,
                _ => *state = ServiceState::Stopping,
            }
        }
        let ticker = self.ticker.lock().take();
        if let Some(ticker) = ticker {
            ticker.cancel.cancel();
            let _ = ticker.join.await;
        }
        match self.service.cleanup().await {
            Ok(()) => {
                *self.state.lock() = ServiceState::Stopped;
                tracing::info!(service = self.name(), "stopped");
            }
            Err(e) => {
                *self.state.lock() = ServiceState::Failed;
                tracing::error!(service = self.name(), error = %e, "cleanup failed");
            }
        }
    }

    fn cancel_ticker(&self) {
        if let Some(ticker) = self.ticker.lock().take() {
            // The loop exits at its next cancellation check; an in-flight
            // tick is allowed to finish.
            ticker.cancel.cancel();
        }
    }

    fn spawn_ticker(&self) {
        let cancel = CancellationToken::new();
        let loop_cancel = cancel.clone();
        let service = Arc::clone(&self.service);
        let state = Arc::clone(&self.state);

        let join = tokio::spawn(async move {
            let interval = service.tick_interval();
            loop {
                if loop_cancel.is_cancelled() {
                    break;
                }
                if let Err(e) = service.tick().await {
                    tracing::error!(service = service.name(), error = %e, "tick failed");
                    *state.lock() = ServiceState::Failed;
                    break;
                }
                // Fixed delay: the next tick starts one interval after
                // this one finished.
                tokio::select! {
                    _ = loop_cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        });

        *self.ticker.lock() = Some(Ticker { cancel, join });
    }
}

/// Registry driving all services: started in insertion order, stopped in
/// reverse; stop failures are logged, never propagated.
#[derive(Default)]
pub struct ServiceManager {
    handles: Mutex<Vec<Arc<ServiceHandle>>>,
}

impl ServiceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, service: Arc<dyn Service>) -> Arc<ServiceHandle> {
        let handle = Arc::new(ServiceHandle::new(service));
        self.handles.lock().push(Arc::clone(&handle));
        handle
    }

    pub fn start_all(&self) {
        let handles = self.handles.lock().clone();
        for handle in handles {
            handle.start();
        }
    }

    pub async fn stop_all(&self) {
        let handles: Vec<_> = self.handles.lock().clone();
        for handle in handles.into_iter().rev() {
            handle.stop().await;
            if handle.is_failed() {
                tracing::warn!(service = handle.name(), "service failed during shutdown");
            }
        }
    }

    /// One status line per registered service.
    pub fn status_report(&self) -> String {
        self.handles
            .lock()
            .iter()
            .map(|h| h.status_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
