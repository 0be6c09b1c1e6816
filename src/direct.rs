//! Direct messenger — point-to-point delivery keyed by window id.
//!
//! A dedicated dispatch path, not a channel: handlers registered by one
//! window never see traffic addressed to another, and there is nothing for
//! other windows to subscribe to. Sending to a window with no handlers (or
//! one that was already torn down) is a silent no-op — the sender has no way
//! to observe delivery anyway.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::HandlerError;
use crate::message::WindowId;

/// A message delivered point-to-point to one window.
#[derive(Debug, Clone)]
pub struct DirectMessage {
    /// Message type (e.g., "drop", "focus-request").
    pub message_type: String,
    /// Arbitrary JSON payload.
    pub payload: Value,
    /// The window that sent the message, or [`WindowId::system`] for
    /// bus-originated delivery.
    pub sender: WindowId,
}

/// A direct-message handler. Failures are contained at the dispatch loop.
pub type DirectFn = dyn Fn(&DirectMessage) -> Result<(), HandlerError> + Send + Sync;

/// Arena key for a registered direct-message handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirectHandlerId(u64);

#[derive(Default)]
struct Inner {
    next_id: u64,
    entries: HashMap<DirectHandlerId, Arc<DirectFn>>,
    /// Handler ids per receiving window, in registration order.
    by_window: HashMap<WindowId, Vec<DirectHandlerId>>,
}

/// Registry of per-window direct-message handlers.
///
/// Cloning is cheap and shares the underlying arena.
#[derive(Clone, Default)]
pub struct DirectMessenger {
    inner: Arc<RwLock<Inner>>,
}

impl DirectMessenger {
    /// Create an empty messenger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` to receive direct messages addressed to `window`.
    pub fn on_message<F>(&self, window: WindowId, callback: F) -> DirectHandlerId
    where
        F: Fn(&DirectMessage) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let mut inner = self.inner.write().unwrap();
        inner.next_id += 1;
        let id = DirectHandlerId(inner.next_id);
        inner.entries.insert(id, Arc::new(callback));
        inner.by_window.entry(window.clone()).or_default().push(id);
        debug!(window = %window, "direct-message handler registered");
        id
    }

    /// Remove a handler. Removing an already-removed id is a no-op.
    pub fn remove_handler(&self, window: &WindowId, id: DirectHandlerId) {
        let mut inner = self.inner.write().unwrap();
        if inner.entries.remove(&id).is_none() {
            return;
        }
        if let Some(handlers) = inner.by_window.get_mut(window) {
            handlers.retain(|h| *h != id);
            if handlers.is_empty() {
                inner.by_window.remove(window);
            }
        }
    }

    /// Remove every handler belonging to `window`. Returns how many were
    /// removed. Subsequent sends to that window are silent no-ops.
    pub fn remove_window(&self, window: &WindowId) -> usize {
        let mut inner = self.inner.write().unwrap();
        let ids = inner.by_window.remove(window).unwrap_or_default();
        for id in &ids {
            inner.entries.remove(id);
        }
        ids.len()
    }

    /// Deliver `message` to every handler registered by `target`, in
    /// registration order, and return how many handlers were invoked.
    pub fn send(&self, target: &WindowId, message: &DirectMessage) -> usize {
        let handlers: Vec<Arc<DirectFn>> = {
            let inner = self.inner.read().unwrap();
            inner
                .by_window
                .get(target)
                .into_iter()
                .flatten()
                .filter_map(|id| inner.entries.get(id))
                .map(Arc::clone)
                .collect()
        };

        for handler in &handlers {
            if let Err(e) = handler(message) {
                warn!(
                    target_window = %target,
                    message_type = %message.message_type,
                    error = %e,
                    "direct-message handler failed"
                );
            }
        }
        handlers.len()
    }

    /// Number of handlers registered by `window`.
    pub fn handler_count(&self, window: &WindowId) -> usize {
        self.inner
            .read()
            .unwrap()
            .by_window
            .get(window)
            .map_or(0, Vec::len)
    }
}

/// Handle to a live direct-message handler registration.
///
/// Calling [`unsubscribe`](DirectSubscription::unsubscribe) more than once
/// is a no-op, as is calling it after the owning window was torn down.
pub struct DirectSubscription {
    messenger: DirectMessenger,
    window: WindowId,
    id: DirectHandlerId,
}

impl DirectSubscription {
    pub(crate) fn new(messenger: DirectMessenger, window: WindowId, id: DirectHandlerId) -> Self {
        Self {
            messenger,
            window,
            id,
        }
    }

    /// Remove this handler from the messenger. Idempotent.
    pub fn unsubscribe(&self) {
        self.messenger.remove_handler(&self.window, self.id);
    }
}
