// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests.

use crate::bus::{EventBus, EventListener, ListenerError};
use crate::copy::{CopyContext, CopyTask};
use crate::rate_limiter::RateLimiter;
use crate::speed::{ProbeGroup, SpeedProbe};
use parking_lot::Mutex;
use pk_adapters::MemoryIndex;
use pk_core::config::{CopyConfig, RateLimiterConfig};
use pk_core::test_support::test_config;
use pk_core::{DeviceHandle, DeviceSerial, Event, EventKind};
use pk_storage::{FakeProbe, StorageController};
use std::path::PathBuf;
use std::sync::Arc;

/// Listener that records every event it sees.
pub struct Events {
    seen: Mutex<Vec<Event>>,
}

impl Events {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn all(&self) -> Vec<Event> {
        self.seen.lock().clone()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.seen.lock().iter().filter(|e| e.kind() == kind).count()
    }
}

impl EventListener for Events {
    fn name(&self) -> &str {
        "test-events"
    }

    fn on_event(&self, event: &Event) -> Result<(), ListenerError> {
        self.seen.lock().push(event.clone());
        Ok(())
    }
}

/// A copy pipeline wired onto tempdirs and fakes.
pub struct EngineRig {
    pub work: tempfile::TempDir,
    pub source_dir: tempfile::TempDir,
    pub ctx: Arc<CopyContext>,
    pub probe: Arc<FakeProbe>,
    pub index: Arc<MemoryIndex>,
    pub bus: Arc<EventBus>,
    pub events: Arc<Events>,
}

impl EngineRig {
    pub fn new(free: u64) -> Self {
        Self::with_config(free, |_| {})
    }

    /// Build a rig with a tweaked config.
    pub fn with_config(free: u64, tweak: impl FnOnce(&mut pk_core::Config)) -> Self {
        let work = tempfile::tempdir().unwrap();
        let source_dir = tempfile::tempdir().unwrap();
        let mut config = test_config(work.path());
        tweak(&mut config);
        let config = Arc::new(config);

        let probe = Arc::new(FakeProbe::new(free, free.saturating_mul(2)));
        let storage = Arc::new(StorageController::with_probe(
            work.path().to_path_buf(),
            0,
            Arc::clone(&probe) as _,
        ));
        let index = Arc::new(MemoryIndex::new());
        let bus = Arc::new(EventBus::new());
        let events = Events::new();
        bus.register_all(events.clone());

        let rate_limiter = Arc::new(RateLimiter::new(
            &CopyConfig::default(),
            &RateLimiterConfig::default(),
        ));

        let ctx = Arc::new(CopyContext {
            config,
            storage,
            index: Arc::clone(&index) as _,
            rate_limiter,
            bus: Arc::clone(&bus),
            probes: Arc::new(ProbeGroup::new()),
            global_probe: SpeedProbe::new(),
        });

        Self {
            work,
            source_dir,
            ctx,
            probe,
            index,
            bus,
            events,
        }
    }

    pub fn device(&self) -> DeviceHandle {
        DeviceHandle {
            serial: DeviceSerial::new("S1"),
            root: self.source_dir.path().to_path_buf(),
            volume_name: "VOL".into(),
        }
    }

    /// Create a source file and wrap it in a task.
    pub fn file_task(&self, name: &str, contents: &[u8]) -> CopyTask {
        let path = self.source_dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        self.task_for(path)
    }

    pub fn task_for(&self, path: PathBuf) -> CopyTask {
        CopyTask::new(path, self.device(), Arc::clone(&self.ctx))
    }
}
