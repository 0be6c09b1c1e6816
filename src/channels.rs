//! Channel registry — named pub/sub channels and their subscriber lists.
//!
//! Channels are implicit: created on first subscription or first publish,
//! never explicitly destroyed. Subscriptions live in an arena keyed by
//! `SubscriptionId` and tagged with the owning [`WindowId`], so teardown on
//! window close removes everything a window registered without relying on
//! captured closures.
//!
//! ## Example
//!
//! ```
//! use deskbus::{Bus, WindowId};
//! use serde_json::json;
//!
//! let bus = Bus::default();
//! let handle = bus.handle(WindowId::new("w1"));
//!
//! let sub = handle.subscribe("demo.events", |msg| {
//!     assert_eq!(msg.message_type, "ping");
//!     Ok(())
//! });
//!
//! handle.publish("demo.events", "ping", json!({ "n": 1 }));
//! sub.unsubscribe();
//! ```

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::HandlerError;
use crate::message::{Message, WindowId};

/// The channel pattern matching every publish.
pub const WILDCARD: &str = "*";

/// A subscriber callback. Failures are contained at the dispatch loop and
/// never reach the publisher.
pub type SubscriberFn = dyn Fn(&Message) -> Result<(), HandlerError> + Send + Sync;

/// Arena key for a registered subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Introspection snapshot entry: a channel with at least one live subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelInfo {
    /// Channel name (or `"*"` for the wildcard pseudo-channel).
    pub channel: String,
    /// Live subscriber count.
    pub subscribers: usize,
}

struct SubscriptionEntry {
    owner: WindowId,
    pattern: String,
    callback: Arc<SubscriberFn>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    entries: HashMap<SubscriptionId, SubscriptionEntry>,
    /// Exact-pattern subscriptions per channel, in registration order.
    exact: HashMap<String, Vec<SubscriptionId>>,
    /// Wildcard subscriptions, in registration order.
    wildcard: Vec<SubscriptionId>,
    /// Subscription ids per owning window, for bulk teardown.
    by_owner: HashMap<WindowId, Vec<SubscriptionId>>,
}

/// Registry of channels and their subscribers.
///
/// Cloning is cheap and shares the underlying arena. All mutation happens
/// under an internal lock; callbacks are invoked after the lock is released,
/// against the subscriber snapshot taken at publish time.
#[derive(Clone, Default)]
pub struct ChannelRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl ChannelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for every publish matching `pattern` (an exact
    /// channel name, or [`WILDCARD`] for every channel).
    ///
    /// Duplicate patterns are independent subscriptions, each invoked once
    /// per matching publish.
    pub fn subscribe<F>(&self, owner: WindowId, pattern: &str, callback: F) -> SubscriptionId
    where
        F: Fn(&Message) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let mut inner = self.inner.write().unwrap();
        inner.next_id += 1;
        let id = SubscriptionId(inner.next_id);

        inner.entries.insert(
            id,
            SubscriptionEntry {
                owner: owner.clone(),
                pattern: pattern.to_string(),
                callback: Arc::new(callback),
            },
        );
        if pattern == WILDCARD {
            inner.wildcard.push(id);
        } else {
            inner.exact.entry(pattern.to_string()).or_default().push(id);
        }
        inner.by_owner.entry(owner.clone()).or_default().push(id);

        debug!(pattern, owner = %owner, "subscription created");
        id
    }

    /// Remove a subscription. Removing an already-removed id is a no-op.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut inner = self.inner.write().unwrap();
        let Some(entry) = inner.entries.remove(&id) else {
            return;
        };

        if entry.pattern == WILDCARD {
            inner.wildcard.retain(|s| *s != id);
        } else if let Some(subs) = inner.exact.get_mut(&entry.pattern) {
            subs.retain(|s| *s != id);
            if subs.is_empty() {
                inner.exact.remove(&entry.pattern);
            }
        }
        if let Some(owned) = inner.by_owner.get_mut(&entry.owner) {
            owned.retain(|s| *s != id);
            if owned.is_empty() {
                inner.by_owner.remove(&entry.owner);
            }
        }

        debug!(pattern = %entry.pattern, owner = %entry.owner, "subscription removed");
    }

    /// Remove every subscription owned by `window`. Returns how many were
    /// removed. Safe to call when some were already individually removed.
    pub fn remove_owner(&self, window: &WindowId) -> usize {
        let ids = {
            let inner = self.inner.read().unwrap();
            inner.by_owner.get(window).cloned().unwrap_or_default()
        };
        let removed = ids.len();
        for id in ids {
            self.unsubscribe(id);
        }
        removed
    }

    /// Deliver `message` to every matching subscriber and return how many
    /// callbacks were invoked.
    ///
    /// Dispatch order: exact-match subscribers in registration order, then
    /// wildcard subscribers in registration order. The snapshot is taken
    /// before any callback runs, so subscriptions created (or removed) by a
    /// callback take effect only for later publishes. A failing callback is
    /// logged and never stops delivery to the rest.
    pub fn dispatch(&self, message: &Message) -> usize {
        let callbacks: Vec<Arc<SubscriberFn>> = {
            let inner = self.inner.read().unwrap();
            let exact = inner.exact.get(&message.channel);
            exact
                .into_iter()
                .flatten()
                .chain(inner.wildcard.iter())
                .filter_map(|id| inner.entries.get(id))
                .map(|entry| Arc::clone(&entry.callback))
                .collect()
        };

        for callback in &callbacks {
            if let Err(e) = callback(message) {
                warn!(
                    channel = %message.channel,
                    message_type = %message.message_type,
                    error = %e,
                    "subscriber callback failed"
                );
            }
        }
        callbacks.len()
    }

    /// Snapshot of every channel with at least one live subscriber, sorted
    /// by name. Wildcard subscriptions appear under the `"*"` pseudo-channel.
    pub fn channels(&self) -> Vec<ChannelInfo> {
        let inner = self.inner.read().unwrap();
        let mut out: Vec<ChannelInfo> = inner
            .exact
            .iter()
            .map(|(channel, subs)| ChannelInfo {
                channel: channel.clone(),
                subscribers: subs.len(),
            })
            .collect();
        if !inner.wildcard.is_empty() {
            out.push(ChannelInfo {
                channel: WILDCARD.to_string(),
                subscribers: inner.wildcard.len(),
            });
        }
        out.sort_by(|a, b| a.channel.cmp(&b.channel));
        out
    }

    /// Live subscriber count for one exact channel name.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        let inner = self.inner.read().unwrap();
        if channel == WILDCARD {
            inner.wildcard.len()
        } else {
            inner.exact.get(channel).map_or(0, Vec::len)
        }
    }

    /// Total live subscriptions across all channels and the wildcard.
    pub fn total_subscriptions(&self) -> usize {
        self.inner.read().unwrap().entries.len()
    }
}

/// Handle to a live channel subscription.
///
/// Calling [`unsubscribe`](Subscription::unsubscribe) more than once is a
/// no-op, as is calling it after the owning window was torn down.
pub struct Subscription {
    registry: ChannelRegistry,
    id: SubscriptionId,
}

impl Subscription {
    pub(crate) fn new(registry: ChannelRegistry, id: SubscriptionId) -> Self {
        Self { registry, id }
    }

    /// Remove this subscription from the registry. Idempotent.
    pub fn unsubscribe(&self) {
        self.registry.unsubscribe(self.id);
    }

    /// The arena id of this subscription.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}
