// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Packrat Daemon (pkd)
//!
//! Background process that mirrors removable volumes into the work
//! directory. Wires the engine services together, drives them from one
//! service manager, and shuts down in reverse order on SIGINT/SIGTERM.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod env;
mod listeners;

use fs2::FileExt;
use pk_adapters::{MemoryIndex, SystemVolumeProvider, VolumeProvider};
use pk_core::{Config, ConfigHandle};
use pk_engine::{
    CopyContext, CopyExecutor, DeviceManager, DeviceManagerDeps, EventBus, LoadEvaluator,
    PriorityScheduler, ProbeGroup, RateLimiter, RecyclerService, Service, ServiceManager,
    SnifferLifecycleManager, SpeedProbe,
};
use pk_storage::{FileRecordStore, StorageController};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use crate::listeners::{LogListener, StatsListener};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config_path: Option<PathBuf> = env::config_path_override();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("pkd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                print_help();
                return Ok(());
            }
            "--config" => {
                config_path = args.next().map(PathBuf::from);
                if config_path.is_none() {
                    eprintln!("error: --config requires a path");
                    std::process::exit(1);
                }
            }
            other => {
                eprintln!("error: unexpected argument '{other}'");
                eprintln!("Usage: pkd [--config <path>] [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config_path = config_path.unwrap_or_else(default_config_path);
    let config = Arc::new(Config::load_or_default(&config_path)?);

    let state_dir = state_dir()?;
    std::fs::create_dir_all(&state_dir)?;

    let log_path = state_dir.join("pkd.log");
    rotate_log_if_needed(&log_path);
    let _log_guard = setup_logging(&log_path)?;

    info!(config = %config_path.display(), "starting pkd");

    // Single-instance lock; held for the process lifetime.
    let lock_path = state_dir.join("pkd.pid");
    let _lock_file = match acquire_lock(&lock_path) {
        Ok(file) => file,
        Err(e) => {
            let pid = std::fs::read_to_string(&lock_path).unwrap_or_default();
            eprintln!("pkd is already running");
            if !pid.trim().is_empty() {
                eprintln!("  pid: {}", pid.trim());
            }
            error!(error = %e, "lock acquisition failed");
            std::process::exit(1);
        }
    };

    std::fs::create_dir_all(&config.copy.work_path)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(config, &state_dir))
}

async fn run(config: ConfigHandle, state_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let bus = Arc::new(EventBus::new());
    let stats = Arc::new(StatsListener::new());
    bus.register_all(Arc::new(LogListener));
    bus.register_all(Arc::clone(&stats) as _);

    let probes = Arc::new(ProbeGroup::new());
    let global_probe = SpeedProbe::new();

    let storage = Arc::new(StorageController::new(
        config.copy.work_path.clone(),
        config.storage.reserved_bytes,
    ));

    let executor = CopyExecutor::new(&config.pool);
    executor.start();

    let rate_limiter = Arc::new(
        RateLimiter::new(&config.copy, &config.rate_limiter)
            .with_probe(Arc::clone(&global_probe)),
    );

    let evaluator = Arc::new(LoadEvaluator::new(
        Arc::clone(&executor),
        Arc::clone(&probes),
        config.scheduler.load.clone(),
    ));

    let scheduler = Arc::new(PriorityScheduler::new(
        Arc::clone(&executor),
        evaluator,
        Arc::clone(&rate_limiter),
        Arc::clone(&config),
    ));

    let copy_ctx = Arc::new(CopyContext {
        config: Arc::clone(&config),
        storage: Arc::clone(&storage),
        index: Arc::new(MemoryIndex::new()),
        rate_limiter,
        bus: Arc::clone(&bus),
        probes,
        global_probe,
    });

    let records = Arc::new(FileRecordStore::new(state_dir.join("device_records")));
    let lifecycle = Arc::new(SnifferLifecycleManager::new(&config.sniffer));

    let manager = Arc::new(DeviceManager::new(DeviceManagerDeps {
        volumes: volume_provider(),
        records,
        storage: Arc::clone(&storage),
        scheduler: Arc::clone(&scheduler),
        copy_ctx,
        bus: Arc::clone(&bus),
        lifecycle,
        config: Arc::clone(&config),
    }));

    let services = ServiceManager::new();
    services.register(scheduler as Arc<dyn Service>);
    services.register(manager as Arc<dyn Service>);
    services.register(Arc::new(RecyclerService::new(
        Arc::clone(&storage),
        Arc::clone(&bus),
        Arc::clone(&config),
    )) as Arc<dyn Service>);

    services.start_all();
    info!("services up:\n{}", services.status_report());

    shutdown_signal().await;
    info!("shutdown requested");

    services.stop_all().await;
    executor.shutdown().await;

    info!(stats = %stats.summary(), "pkd stopped");
    Ok(())
}

fn print_help() {
    println!("pkd {}", env!("CARGO_PKG_VERSION"));
    println!("Packrat daemon - mirrors removable volumes into a local work directory");
    println!();
    println!("USAGE:");
    println!("    pkd [--config <path>]");
    println!();
    println!("OPTIONS:");
    println!("    --config <path>  Read configuration from <path>");
    println!("    -h, --help       Print help information");
    println!("    -v, --version    Print version information");
    println!();
    println!("ENVIRONMENT:");
    println!("    PACKRAT_CONFIG     Config file (same as --config)");
    println!("    PACKRAT_STATE_DIR  State directory for lock, log, records");
}

/// Platform volume source.
#[cfg(windows)]
fn volume_provider() -> Arc<dyn VolumeProvider> {
    Arc::new(SystemVolumeProvider::new())
}

/// Platform volume source: scan /media on non-Windows hosts.
#[cfg(not(windows))]
fn volume_provider() -> Arc<dyn VolumeProvider> {
    Arc::new(SystemVolumeProvider::with_mount_base(PathBuf::from(
        "/media",
    )))
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("packrat")
        .join("packrat.toml")
}

fn state_dir() -> std::io::Result<PathBuf> {
    if let Some(dir) = env::state_dir_override() {
        return Ok(dir);
    }
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|base| base.join("packrat"))
        .ok_or_else(|| std::io::Error::other("no user state directory available"))
}

/// Take the exclusive pid-file lock or fail.
fn acquire_lock(lock_path: &Path) -> std::io::Result<File> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(lock_path)?;
    file.try_lock_exclusive()?;
    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;
    Ok(file)
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep (pkd.log.1, .2, .3).
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate the log file if it exceeds [`MAX_LOG_SIZE`].
///
/// Shifts `pkd.log` → `pkd.log.1` → `pkd.log.2` → `pkd.log.3`, deleting
/// the oldest. Best-effort: rotation failures never block startup.
fn rotate_log_if_needed(log_path: &Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

fn setup_logging(
    log_path: &Path,
) -> Result<tracing_appender::non_blocking::WorkerGuard, Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let dir = log_path
        .parent()
        .ok_or_else(|| std::io::Error::other("log path has no parent"))?;
    let name = log_path
        .file_name()
        .ok_or_else(|| std::io::Error::other("log path has no file name"))?;

    let file_appender = tracing_appender::rolling::never(dir, name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();

    Ok(guard)
}

/// Resolve on SIGINT or, on unix, SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
