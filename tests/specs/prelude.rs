//! Shared rig for the behavioral specs.

use parking_lot::Mutex;
use pk_adapters::{FakeVolumeProvider, MemoryIndex, VolumeInfo};
use pk_core::config::{Config, LoadConfig};
use pk_core::{
    DeviceSerial, DeviceState, Event, EventKind, FakeClock, LoadLevel, LoadScore,
};
use pk_engine::{
    CopyContext, CopyExecutor, DeviceManager, DeviceManagerDeps, EventBus, EventListener,
    ListenerError, LoadSource, PriorityScheduler, ProbeGroup, RateLimiter, Service,
    SnifferLifecycleManager, SpeedProbe,
};
use pk_storage::{FakeProbe, MemoryRecordStore, StorageController};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Records every event dispatched on the bus.
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
        "spec-events"
    }

    fn on_event(&self, event: &Event) -> Result<(), ListenerError> {
        self.seen.lock().push(event.clone());
        Ok(())
    }
}

/// Load source whose level a test flips at will.
pub struct SwitchableLoad {
    level: Mutex<LoadLevel>,
}

impl SwitchableLoad {
    pub fn new(level: LoadLevel) -> Arc<Self> {
        Arc::new(Self {
            level: Mutex::new(level),
        })
    }

    pub fn set(&self, level: LoadLevel) {
        *self.level.lock() = level;
    }
}

impl LoadSource for SwitchableLoad {
    fn evaluate(&self) -> LoadScore {
        let score = match *self.level.lock() {
            LoadLevel::Low => 0,
            LoadLevel::Medium => 50,
            LoadLevel::High => 100,
        };
        LoadScore::from_thresholds(score, LoadConfig::default().low_threshold, LoadConfig::default().high_threshold)
    }
}

/// The whole engine wired over fakes.
///
/// Exposes more than any one spec uses; individual specs pick the pieces
/// they observe.
#[allow(dead_code)]
pub struct SpecRig {
    pub work: tempfile::TempDir,
    pub sticks: Vec<tempfile::TempDir>,
    pub config: Arc<Config>,
    pub bus: Arc<EventBus>,
    pub events: Arc<Events>,
    pub probe: Arc<FakeProbe>,
    pub index: Arc<MemoryIndex>,
    pub executor: Arc<CopyExecutor>,
    pub scheduler: Arc<PriorityScheduler>,
    pub load: Arc<SwitchableLoad>,
    pub copy_ctx: Arc<CopyContext>,
    pub volumes: Arc<FakeVolumeProvider>,
    pub records: Arc<MemoryRecordStore>,
    pub clock: FakeClock,
    pub manager: DeviceManager<FakeClock>,
}

impl SpecRig {
    pub fn new() -> Self {
        Self::build(None, |_| {})
    }

    pub fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
        Self::build(None, tweak)
    }

    /// Rig whose record store is seeded before the manager loads ghosts.
    pub fn with_records(blob: &str) -> Self {
        Self::build(Some(blob), |_| {})
    }

    fn build(record_blob: Option<&str>, tweak: impl FnOnce(&mut Config)) -> Self {
        let work = tempfile::tempdir().unwrap();
        let mut config = pk_core::test_support::test_config(work.path());
        // Keep fake tempdir volumes from matching the work volume.
        config.copy.work_path = work.path().join("mirror");
        // One worker makes completion order deterministic across specs.
        config.pool.core_workers = 1;
        config.pool.max_workers = 1;
        tweak(&mut config);
        let work_path = config.copy.work_path.clone();
        let config = Arc::new(config);

        let bus = Arc::new(EventBus::new());
        let events = Events::new();
        bus.register_all(events.clone());

        let probe = Arc::new(FakeProbe::new(1_000_000_000, 2_000_000_000));
        let storage = Arc::new(StorageController::with_probe(
            work_path,
            0,
            Arc::clone(&probe) as _,
        ));

        let executor = CopyExecutor::new(&config.pool);
        executor.start();

        let probes = Arc::new(ProbeGroup::new());
        let global_probe = SpeedProbe::new();
        let rate_limiter = Arc::new(
            RateLimiter::new(&config.copy, &config.rate_limiter)
                .with_probe(Arc::clone(&global_probe)),
        );

        let load = SwitchableLoad::new(LoadLevel::Low);
        let scheduler = Arc::new(PriorityScheduler::new(
            Arc::clone(&executor),
            Arc::clone(&load) as _,
            Arc::clone(&rate_limiter),
            Arc::clone(&config),
        ));

        let index = Arc::new(MemoryIndex::new());
        let copy_ctx = Arc::new(CopyContext {
            config: Arc::clone(&config),
            storage: Arc::clone(&storage),
            index: Arc::clone(&index) as _,
            rate_limiter,
            bus: Arc::clone(&bus),
            probes,
            global_probe,
        });

        let volumes = Arc::new(FakeVolumeProvider::new());
        let records = Arc::new(match record_blob {
            Some(blob) => MemoryRecordStore::with_blob(blob),
            None => MemoryRecordStore::new(),
        });
        let clock = FakeClock::new();
        let lifecycle = Arc::new(SnifferLifecycleManager::new(&config.sniffer));

        let manager = DeviceManager::with_clock(
            DeviceManagerDeps {
                volumes: Arc::clone(&volumes) as _,
                records: Arc::clone(&records) as _,
                storage,
                scheduler: Arc::clone(&scheduler),
                copy_ctx: Arc::clone(&copy_ctx),
                bus: Arc::clone(&bus),
                lifecycle,
                config: Arc::clone(&config),
            },
            clock.clone(),
        );

        Self {
            work,
            sticks: Vec::new(),
            config,
            bus,
            events,
            probe,
            index,
            executor,
            scheduler,
            load,
            copy_ctx,
            volumes,
            records,
            clock,
            manager,
        }
    }

    /// Plug a FAT32 stick populated with `files` (relative path, bytes).
    pub fn plug(&mut self, serial: &str, name: &str, files: &[(&str, &[u8])]) -> PathBuf {
        let stick = tempfile::tempdir().unwrap();
        for (rel, contents) in files {
            let path = stick.path().join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&path, contents).unwrap();
        }
        let root = stick.path().to_path_buf();
        self.volumes.plug(VolumeInfo {
            root: root.clone(),
            serial: serial.into(),
            name: name.into(),
            filesystem: "FAT32".into(),
        });
        self.sticks.push(stick);
        root
    }

    pub fn state_of(&self, serial: &str) -> Option<DeviceState> {
        self.manager
            .device_states()
            .get(&DeviceSerial::new(serial))
            .copied()
    }

    /// Destination path for a file on a plugged stick.
    pub fn dest_for(&self, serial: &str, name: &str, rel: &str) -> PathBuf {
        self.config
            .copy
            .work_path
            .join(format!("{name}_{serial}"))
            .join(rel)
    }

    /// Pump manager and scheduler ticks until `predicate` holds.
    pub async fn settle(&self, predicate: impl Fn(&Self) -> bool) {
        for _ in 0..500 {
            if predicate(self) {
                return;
            }
            self.manager.tick().await.unwrap();
            self.scheduler.tick().await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("spec condition not reached in time");
    }

    pub async fn teardown(self) {
        self.manager.cleanup().await.unwrap();
        self.executor.shutdown().await;
    }
}
