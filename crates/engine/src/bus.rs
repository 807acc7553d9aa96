// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process, synchronous event bus.
//!
//! Subscribers register per [`EventKind`] and are invoked in registration
//! order on the publishing thread. Each handler call is isolated: an `Err`
//! or a panic is logged and delivery continues with the next subscriber.
//! Handlers may publish re-entrantly.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use thiserror::Error;
use wid_core::{Event, EventKind};

/// Error returned by a subscriber
#[derive(Debug, Error)]
pub enum BusError {
    #[error("handler failed: {0}")]
    Handler(String),
}

type Handler = Arc<dyn Fn(&Event) -> Result<(), BusError> + Send + Sync>;

struct Entry {
    id: u64,
    name: &'static str,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: HashMap<EventKind, Vec<Entry>>,
}

/// Cheaply cloneable handle to a shared bus
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events of `kind`. Dropping the returned
    /// [`Subscription`] detaches it.
    #[must_use = "dropping the subscription unsubscribes the handler"]
    pub fn subscribe<F>(&self, kind: EventKind, name: &'static str, handler: F) -> Subscription
    where
        F: Fn(&Event) -> Result<(), BusError> + Send + Sync + 'static,
    {
        let mut registry = self.inner.lock();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.handlers.entry(kind).or_default().push(Entry {
            id,
            name,
            handler: Arc::new(handler),
        });
        Subscription {
            bus: Arc::downgrade(&self.inner),
            kind,
            id,
        }
    }

    /// Deliver `event` to every subscriber of its kind. Returns the number of
    /// handlers that completed without error.
    pub fn publish(&self, event: &Event) -> usize {
        // Snapshot so handlers can subscribe or publish without deadlocking
        let handlers: Vec<(&'static str, Handler)> = {
            let registry = self.inner.lock();
            match registry.handlers.get(&event.kind()) {
                Some(entries) => entries
                    .iter()
                    .map(|e| (e.name, Arc::clone(&e.handler)))
                    .collect(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        for (name, handler) in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    tracing::warn!(subscriber = name, event = event.name(), error = %e, "handler failed")
                }
                Err(payload) => tracing::error!(
                    subscriber = name,
                    event = event.name(),
                    panic = %panic_payload_to_string(payload.as_ref()),
                    "handler panicked"
                ),
            }
        }
        delivered
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.inner
            .lock()
            .handlers
            .get(&kind)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

fn panic_payload_to_string(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&'static str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Registration handle. Unsubscribes on drop or on [`Subscription::unsubscribe`].
pub struct Subscription {
    bus: Weak<Mutex<Registry>>,
    kind: EventKind,
    id: u64,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Detach the handler. Safe to call more than once.
    pub fn unsubscribe(&mut self) {
        let Some(bus) = self.bus.upgrade() else {
            return;
        };
        let mut registry = bus.lock();
        if let Some(entries) = registry.handlers.get_mut(&self.kind) {
            entries.retain(|e| e.id != self.id);
        }
        self.bus = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
