//! Request/response coordinator — correlation and timeouts atop pub/sub.
//!
//! The bus implements only the waiting side of the protocol: it publishes
//! the request with a correlation envelope, waits on a transient per-request
//! reply channel, and enforces the timeout. Some other program must be
//! subscribed to the request channel and publish a reply to the embedded
//! `reply_to` channel — conveniently via
//! [`BusHandle::respond`](crate::BusHandle::respond).
//!
//! ## Protocol
//!
//! 1. Generate a correlation id and derive the reply channel
//!    `deskbus.reply.<id>`.
//! 2. Subscribe to the reply channel.
//! 3. Publish the request on the target channel, wrapping the caller's
//!    payload in a [`RequestEnvelope`].
//! 4. Race the first reply against the timeout.
//! 5. Remove the transient subscription exactly once, whichever way the
//!    race went.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use crate::channels::ChannelRegistry;
use crate::error::BusError;
use crate::message::{now_ms, Message, WindowId};

/// Channel-name prefix for transient per-request reply channels.
pub const REPLY_CHANNEL_PREFIX: &str = "deskbus.reply.";

/// Correlation envelope wrapped around a request payload.
///
/// Responders read `reply_to` (and may check `deadline` to skip work for
/// requests that have already expired) and publish the reply payload on the
/// `reply_to` channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Unique token linking this request to its eventual response.
    pub correlation_id: u64,
    /// Transient channel the requester is waiting on.
    pub reply_to: String,
    /// Wall-clock deadline, ms since the Unix epoch.
    pub deadline: u64,
    /// The caller's original payload.
    pub body: Value,
}

impl RequestEnvelope {
    /// Parse the envelope out of a request message, if it carries one.
    pub fn from_message(message: &Message) -> Option<Self> {
        serde_json::from_value(message.payload.clone()).ok()
    }
}

/// Correlates outgoing requests with incoming replies.
pub(crate) struct RequestCoordinator {
    next_correlation: AtomicU64,
}

impl RequestCoordinator {
    pub(crate) fn new() -> Self {
        Self {
            next_correlation: AtomicU64::new(0),
        }
    }

    /// Run the request protocol described in the module docs.
    ///
    /// `publish` is the bus publish primitive (message construction, history
    /// recording, dispatch); the coordinator supplies the envelope and the
    /// reply subscription around it.
    pub(crate) async fn request<P>(
        &self,
        channels: &ChannelRegistry,
        requester: &WindowId,
        channel: &str,
        message_type: &str,
        payload: Value,
        timeout: Duration,
        publish: P,
    ) -> Result<Value, BusError>
    where
        P: FnOnce(&str, &str, Value) -> Message,
    {
        let correlation_id = self.next_correlation.fetch_add(1, Ordering::Relaxed) + 1;
        let reply_channel = format!("{}{}", REPLY_CHANNEL_PREFIX, correlation_id);
        let timeout_ms = timeout.as_millis() as u64;

        // First reply wins; the slot makes the oneshot sender reusable from
        // a Fn callback.
        let (reply_tx, reply_rx) = oneshot::channel::<Value>();
        let slot = Mutex::new(Some(reply_tx));
        let subscription = channels.subscribe(requester.clone(), &reply_channel, move |msg| {
            if let Some(tx) = slot.lock().unwrap().take() {
                let _ = tx.send(msg.payload.clone());
            }
            Ok(())
        });

        let envelope = RequestEnvelope {
            correlation_id,
            reply_to: reply_channel.clone(),
            deadline: now_ms() + timeout_ms,
            body: payload,
        };
        let request_payload =
            serde_json::to_value(envelope).expect("request envelope serializes to JSON");
        publish(channel, message_type, request_payload);

        let outcome = tokio::time::timeout(timeout, reply_rx).await;

        // Exactly-once transient cleanup, regardless of outcome.
        channels.unsubscribe(subscription);

        match outcome {
            Ok(Ok(reply)) => {
                debug!(channel, correlation_id, "request resolved");
                Ok(reply)
            }
            // Sender dropped without replying (requester torn down mid-wait)
            // or the timer fired.
            Ok(Err(_)) | Err(_) => {
                debug!(channel, correlation_id, timeout_ms, "request timed out");
                Err(BusError::RequestTimeout {
                    channel: channel.to_string(),
                    timeout_ms,
                })
            }
        }
    }
}
