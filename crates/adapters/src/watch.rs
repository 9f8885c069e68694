// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem change notifications bridged into tokio.
//!
//! Each directory is watched non-recursively, mirroring the per-directory
//! watch registration the scanner performs: the root first, then every
//! directory the walk discovers, then directories created while watching.
//! Missed events surface as [`WatchKind::Overflow`].

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("watch backend error: {0}")]
    Backend(#[from] notify::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchKind {
    Create,
    Modify,
    Remove,
    /// The platform dropped events; consumers should not trust counters
    /// derived from this batch.
    Overflow,
    Other,
}

/// One filesystem change observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchKind,
    /// Affected path; `None` for overflow notifications.
    pub path: Option<PathBuf>,
}

/// Per-directory watcher feeding an mpsc channel of [`WatchEvent`]s.
pub struct DirectoryWatcher {
    watcher: RecommendedWatcher,
    watched: HashSet<PathBuf>,
}

impl DirectoryWatcher {
    /// Channel capacity for pending change events.
    const CHANNEL_CAPACITY: usize = 256;

    /// Create a watcher and the receiving end of its event stream.
    pub fn new() -> Result<(Self, mpsc::Receiver<WatchEvent>), WatchError> {
        let (tx, rx) = mpsc::channel(Self::CHANNEL_CAPACITY);
        let watcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                for event in translate(res) {
                    // Blocking send from notify's own thread; drops are
                    // acceptable only on shutdown when the receiver is gone.
                    let _ = tx.blocking_send(event);
                }
            })?;
        Ok((
            Self {
                watcher,
                watched: HashSet::new(),
            },
            rx,
        ))
    }

    /// Watch one directory, non-recursively. Idempotent per path.
    pub fn watch_dir(&mut self, dir: &Path) -> Result<(), WatchError> {
        if self.watched.contains(dir) {
            return Ok(());
        }
        self.watcher.watch(dir, RecursiveMode::NonRecursive)?;
        self.watched.insert(dir.to_path_buf());
        Ok(())
    }

    /// Stop watching a directory that vanished.
    pub fn unwatch_dir(&mut self, dir: &Path) {
        if self.watched.remove(dir) {
            let _ = self.watcher.unwatch(dir);
        }
    }

    pub fn watched_count(&self) -> usize {
        self.watched.len()
    }
}

/// Map a notify callback payload onto our event model.
fn translate(res: Result<notify::Event, notify::Error>) -> Vec<WatchEvent> {
    let event = match res {
        Ok(event) => event,
        Err(_) => {
            return vec![WatchEvent {
                kind: WatchKind::Overflow,
                path: None,
            }]
        }
    };
    if event.need_rescan() {
        return vec![WatchEvent {
            kind: WatchKind::Overflow,
            path: None,
        }];
    }
    let kind = match event.kind {
        notify::EventKind::Create(_) => WatchKind::Create,
        notify::EventKind::Modify(_) => WatchKind::Modify,
        notify::EventKind::Remove(_) => WatchKind::Remove,
        _ => WatchKind::Other,
    };
    event
        .paths
        .into_iter()
        .map(|path| WatchEvent {
            kind,
            path: Some(path),
        })
        .collect()
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
