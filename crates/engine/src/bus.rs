// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed pub/sub event bus.
//!
//! Dispatch is synchronous: every listener registered for the event's kind
//! runs on the dispatching task, and a failing listener is logged without
//! blocking the rest. Registration is idempotent per `(kind, listener name)`.

use parking_lot::RwLock;
use pk_core::{Event, EventKind};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ListenerError(pub String);

/// A consumer of dispatched events.
pub trait EventListener: Send + Sync {
    /// Stable name; one registration per `(kind, name)` pair.
    fn name(&self) -> &str;

    fn on_event(&self, event: &Event) -> Result<(), ListenerError>;
}

struct Registration {
    name: String,
    listener: Arc<dyn EventListener>,
}

/// Process-wide dispatch of immutable event records.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<HashMap<EventKind, Vec<Registration>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for one event kind. Re-registering the same
    /// listener name for the same kind is a no-op.
    pub fn register(&self, kind: EventKind, listener: Arc<dyn EventListener>) {
        let mut listeners = self.listeners.write();
        let entries = listeners.entry(kind).or_default();
        if entries.iter().any(|r| r.name == listener.name()) {
            return;
        }
        entries.push(Registration {
            name: listener.name().to_string(),
            listener,
        });
    }

    /// Register `listener` for every event kind.
    pub fn register_all(&self, listener: Arc<dyn EventListener>) {
        for kind in EventKind::ALL {
            self.register(kind, Arc::clone(&listener));
        }
    }

    /// Deliver `event` to all listeners for its kind, in registration
    /// order. Listener errors are logged and never propagate.
    pub fn dispatch(&self, event: &Event) {
        let listeners = self.listeners.read();
        let Some(entries) = listeners.get(&event.kind()) else {
            return;
        };
        for entry in entries {
            if let Err(e) = entry.listener.on_event(event) {
                tracing::warn!(
                    listener = %entry.name,
                    event = event.name(),
                    error = %e,
                    "event listener failed"
                );
            }
        }
    }

    /// Dispatch on a separate task. Exists for collectors; the core's hot
    /// paths use [`EventBus::dispatch`].
    pub fn dispatch_async(self: &Arc<Self>, event: Event) {
        let bus = Arc::clone(self);
        tokio::spawn(async move {
            bus.dispatch(&event);
        });
    }

    /// Like [`EventBus::dispatch`], but collect listener failures instead
    /// of logging them. Exists for collectors; unused on core hot paths.
    pub fn dispatch_with_result(&self, event: &Event) -> Vec<(String, ListenerError)> {
        let listeners = self.listeners.read();
        let Some(entries) = listeners.get(&event.kind()) else {
            return Vec::new();
        };
        entries
            .iter()
            .filter_map(|entry| {
                entry
                    .listener
                    .on_event(event)
                    .err()
                    .map(|e| (entry.name.clone(), e))
            })
            .collect()
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.read().get(&kind).map_or(0, Vec::len)
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
