//! deskbus — in-process message bus for a terminal desktop shell.
//!
//! The shell hosts pluggable programs in windows; this crate is how they
//! talk to each other. One [`Bus`] instance serves the whole process, and
//! each window interacts through a capability-scoped [`BusHandle`].
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   BusHandle (per window)                     │
//! │  publish / subscribe / call_service / request /              │
//! │  send_to_window / on_direct_message / introspection          │
//! └─────────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Bus (one per process)                     │
//! │  window teardown · message ids · history on every publish    │
//! └─────────────────────────────────────────────────────────────┘
//!       │               │                │              │
//!       ▼               ▼                ▼              ▼
//! ┌───────────┐  ┌─────────────┐  ┌────────────┐  ┌──────────┐
//! │ Channel   │  │  Service    │  │  Direct    │  │ Message  │
//! │ Registry  │  │  Registry   │  │  Messenger │  │ History  │
//! └───────────┘  └─────────────┘  └────────────┘  └──────────┘
//! ```
//!
//! Delivery contract: `publish` dispatches synchronously against the
//! subscriber snapshot taken at publish time — exact-match subscribers in
//! registration order, then wildcard (`"*"`) subscribers in registration
//! order. A failing callback is logged and never reaches the publisher.
//!
//! Request/response rides on pub/sub: [`BusHandle::request`] wraps the
//! payload in a correlation envelope, waits on a transient reply channel,
//! and times out with [`BusError::RequestTimeout`]. Responders reply with
//! [`BusHandle::respond`].
//!
//! When the window manager closes a window it calls [`Bus::cleanup_window`],
//! which removes that window's subscriptions, services, and direct-message
//! handlers in one shot.

mod bus;
mod channels;
mod config;
mod direct;
mod error;
mod history;
mod message;
mod request;
mod services;

pub use bus::{Bus, BusHandle, WindowInfo};
pub use channels::{
    ChannelInfo, ChannelRegistry, SubscriberFn, Subscription, SubscriptionId, WILDCARD,
};
pub use config::BusConfig;
pub use direct::{DirectFn, DirectHandlerId, DirectMessage, DirectMessenger, DirectSubscription};
pub use error::{BusError, HandlerError};
pub use history::MessageHistory;
pub use message::{Message, WindowId};
pub use request::{RequestEnvelope, REPLY_CHANNEL_PREFIX};
pub use services::{MethodFn, MethodFuture, ServiceMethods, ServiceRegistry};
