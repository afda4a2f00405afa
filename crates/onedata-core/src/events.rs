//! Execution notifications.
//!
//! Listeners are told about every completed operation. They run on the
//! calling thread after the operation finished, outside the cache lock.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::query::TransactionKind;

/// A completed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionEvent {
    pub kind: TransactionKind,
    /// Model name, or the table hint for stored procedures.
    pub table: String,
    pub from_cache: bool,
    pub rows: usize,
}

/// Callback invoked for each event.
pub type Listener = Arc<dyn Fn(&ExecutionEvent) + Send + Sync>;

/// Fan-out of execution events to subscribed listeners.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<Listener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener.
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&ExecutionEvent) + Send + Sync + 'static,
    {
        self.listeners.write().push(Arc::new(listener));
    }

    /// Deliver an event to every listener.
    pub fn publish(&self, event: &ExecutionEvent) {
        // Snapshot so a listener may subscribe without deadlocking.
        let listeners: Vec<Listener> = self.listeners.read().clone();
        for listener in listeners {
            listener(event);
        }
        tracing::trace!(kind = %event.kind, table = %event.table, rows = event.rows, "event published");
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.len())
            .finish()
    }
}
