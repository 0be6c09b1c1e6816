//! Bus façade — the single entry point for programs and the window manager.
//!
//! A [`Bus`] is constructed once at shell start and passed explicitly to
//! whatever needs it; there is no ambient global instance. Programs never
//! hold the bus directly — each window gets a capability-scoped
//! [`BusHandle`] from [`Bus::handle`], and every subscription, service, and
//! direct-message handler created through it is tagged with that window's
//! id. The window manager calls [`Bus::cleanup_window`] on close, which
//! bulk-removes everything the window registered.
//!
//! ## Example
//!
//! ```
//! use deskbus::{Bus, WindowId};
//! use serde_json::json;
//!
//! let bus = Bus::default();
//!
//! let monitor = bus.handle(WindowId::new("monitor"));
//! monitor.subscribe("*", |msg| {
//!     println!("[{}] {}", msg.channel, msg.message_type);
//!     Ok(())
//! });
//!
//! let game = bus.handle(WindowId::new("game"));
//! game.publish("game.events", "score", json!({ "points": 10 }));
//!
//! bus.cleanup_window(&WindowId::new("monitor"));
//! assert!(bus.channels().is_empty());
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::channels::{ChannelInfo, ChannelRegistry, Subscription};
use crate::config::BusConfig;
use crate::direct::{DirectMessage, DirectMessenger, DirectSubscription};
use crate::error::{BusError, HandlerError};
use crate::history::MessageHistory;
use crate::message::{now_ms, Message, WindowId};
use crate::request::{RequestCoordinator, RequestEnvelope};
use crate::services::{ServiceMethods, ServiceRegistry};

/// Window metadata as supplied by the window manager.
///
/// Introspection-facing programs (taskbars, monitors) consume this; the bus
/// core itself never does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    /// The window's id.
    pub id: WindowId,
    /// Whether the window currently has focus.
    pub is_focused: bool,
    /// Whether the window is minimized.
    pub is_minimized: bool,
}

/// The in-process message bus.
///
/// Cloning is cheap and shares all underlying state, following the same
/// pattern as a shared in-memory queue: the registries live behind `Arc`s,
/// so the window manager and every handle observe one bus.
#[derive(Clone)]
pub struct Bus {
    channels: ChannelRegistry,
    services: ServiceRegistry,
    direct: DirectMessenger,
    history: MessageHistory,
    requests: Arc<RequestCoordinator>,
    next_message_id: Arc<AtomicU64>,
    config: Arc<BusConfig>,
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

impl Bus {
    /// Create a bus with the given configuration.
    pub fn new(config: BusConfig) -> Self {
        Self {
            channels: ChannelRegistry::new(),
            services: ServiceRegistry::new(),
            direct: DirectMessenger::new(),
            history: MessageHistory::new(config.history_cap),
            requests: Arc::new(RequestCoordinator::new()),
            next_message_id: Arc::new(AtomicU64::new(0)),
            config: Arc::new(config),
        }
    }

    /// Create a capability-scoped handle for one window.
    ///
    /// Everything registered through the handle is owned by `window` and
    /// removed by [`cleanup_window`](Bus::cleanup_window).
    pub fn handle(&self, window: WindowId) -> BusHandle {
        BusHandle {
            bus: self.clone(),
            window,
        }
    }

    /// Tear down everything a closed window registered: channel
    /// subscriptions, services, and direct-message handlers.
    ///
    /// The window manager calls this exactly once per window close (not on
    /// minimize). It is safe to call even if some of the window's
    /// registrations were already individually removed; afterwards,
    /// `send_to_window` to this window is a silent no-op.
    pub fn cleanup_window(&self, window: &WindowId) {
        let subscriptions = self.channels.remove_owner(window);
        let services = self.services.remove_owner(window);
        let direct_handlers = self.direct.remove_window(window);
        info!(
            window = %window,
            subscriptions,
            services,
            direct_handlers,
            "window torn down"
        );
    }

    /// Channels with at least one live subscriber, with subscriber counts.
    pub fn channels(&self) -> Vec<ChannelInfo> {
        self.channels.channels()
    }

    /// Live subscriber count for one channel.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels.subscriber_count(channel)
    }

    /// Names of all registered services.
    pub fn services(&self) -> Vec<String> {
        self.services.services()
    }

    /// Method names of one service; empty when the service is unknown.
    pub fn service_methods(&self, name: &str) -> Vec<String> {
        self.services.service_methods(name)
    }

    /// Recently published messages, oldest first, bounded by the configured
    /// history cap.
    pub fn message_history(&self) -> Vec<Message> {
        self.history.messages()
    }

    /// The configuration this bus was built with.
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Construct the message, record it in history, then dispatch it
    /// synchronously against the subscriber snapshot.
    fn publish_from(
        &self,
        source: &WindowId,
        channel: &str,
        message_type: &str,
        payload: Value,
    ) -> Message {
        let message = Message {
            id: self.next_message_id.fetch_add(1, Ordering::Relaxed) + 1,
            channel: channel.to_string(),
            message_type: message_type.to_string(),
            payload,
            timestamp: now_ms(),
            source: Some(source.clone()),
        };
        self.history.record(&message);
        let delivered = self.channels.dispatch(&message);
        debug!(
            channel,
            message_type,
            source = %source,
            delivered,
            "message published"
        );
        message
    }
}

/// A window's capability-scoped view of the bus.
///
/// Obtained from [`Bus::handle`]; the outer API layer hands one to each
/// program. Every operation is tagged with the owning window id.
#[derive(Clone)]
pub struct BusHandle {
    bus: Bus,
    window: WindowId,
}

impl BusHandle {
    /// The window this handle belongs to.
    pub fn window_id(&self) -> &WindowId {
        &self.window
    }

    /// Publish a message on `channel`. Returns the constructed message
    /// after synchronous dispatch to current subscribers.
    pub fn publish(&self, channel: &str, message_type: &str, payload: Value) -> Message {
        self.bus.publish_from(&self.window, channel, message_type, payload)
    }

    /// Subscribe to an exact channel name, or to every channel with the
    /// `"*"` pattern. The returned handle unsubscribes idempotently.
    pub fn subscribe<F>(&self, pattern: &str, callback: F) -> Subscription
    where
        F: Fn(&Message) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let id = self
            .bus
            .channels
            .subscribe(self.window.clone(), pattern, callback);
        Subscription::new(self.bus.channels.clone(), id)
    }

    /// Register a service under `name`, replacing any prior registration
    /// with that name wholesale.
    pub fn register_service(&self, name: &str, methods: ServiceMethods) {
        self.bus.services.register(self.window.clone(), name, methods);
    }

    /// Unregister a service. Unknown names are a no-op.
    pub fn unregister_service(&self, name: &str) {
        self.bus.services.unregister(name);
    }

    /// Call `method` on the service named `service` with positional JSON
    /// args. Fails immediately when the service or method is missing.
    pub async fn call_service(
        &self,
        service: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, BusError> {
        self.bus.services.call(service, method, args).await
    }

    /// Publish a request on `channel` and wait for the first reply, up to
    /// the configured default timeout.
    pub async fn request(
        &self,
        channel: &str,
        message_type: &str,
        payload: Value,
    ) -> Result<Value, BusError> {
        let timeout = self.bus.config.default_request_timeout;
        self.request_with_timeout(channel, message_type, payload, timeout)
            .await
    }

    /// Publish a request on `channel` and wait for the first reply, up to
    /// `timeout`. Times out with [`BusError::RequestTimeout`]; the transient
    /// reply subscription is removed whichever way the race goes.
    pub async fn request_with_timeout(
        &self,
        channel: &str,
        message_type: &str,
        payload: Value,
        timeout: Duration,
    ) -> Result<Value, BusError> {
        self.bus
            .requests
            .request(
                &self.bus.channels,
                &self.window,
                channel,
                message_type,
                payload,
                timeout,
                |channel, message_type, payload| {
                    self.bus
                        .publish_from(&self.window, channel, message_type, payload)
                },
            )
            .await
    }

    /// Reply to a request message received via a subscription.
    ///
    /// Publishes `payload` on the request's embedded `reply_to` channel and
    /// returns the reply message. Returns `None` when `request` carries no
    /// correlation envelope (i.e., it was a plain publish).
    pub fn respond(&self, request: &Message, payload: Value) -> Option<Message> {
        let envelope = RequestEnvelope::from_message(request)?;
        Some(self.publish(&envelope.reply_to, "response", payload))
    }

    /// Send a direct message to `target`. Only handlers registered by that
    /// window receive it; unknown targets are a silent no-op.
    pub fn send_to_window(&self, target: &WindowId, message_type: &str, payload: Value) -> usize {
        let message = DirectMessage {
            message_type: message_type.to_string(),
            payload,
            sender: self.window.clone(),
        };
        self.bus.direct.send(target, &message)
    }

    /// Register a callback for direct messages addressed to this window.
    /// The returned handle unsubscribes idempotently.
    pub fn on_direct_message<F>(&self, callback: F) -> DirectSubscription
    where
        F: Fn(&DirectMessage) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let id = self.bus.direct.on_message(self.window.clone(), callback);
        DirectSubscription::new(self.bus.direct.clone(), self.window.clone(), id)
    }

    /// Channels with at least one live subscriber.
    pub fn channels(&self) -> Vec<ChannelInfo> {
        self.bus.channels()
    }

    /// Names of all registered services.
    pub fn services(&self) -> Vec<String> {
        self.bus.services()
    }

    /// Method names of one service.
    pub fn service_methods(&self, name: &str) -> Vec<String> {
        self.bus.service_methods(name)
    }

    /// Recently published messages, oldest first.
    pub fn message_history(&self) -> Vec<Message> {
        self.bus.message_history()
    }
}
