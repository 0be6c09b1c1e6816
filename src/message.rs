//! Core message and window-identity types for the bus.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HandlerError;

/// Identifies a window — the unit of bus-resource ownership.
///
/// Every subscription, service registration, and direct-message handler is
/// tagged with the `WindowId` of the handle that created it, which is what
/// makes bulk teardown on window close possible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowId(String);

impl WindowId {
    /// Create a window id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Sentinel id used as the sender for bus-originated delivery.
    pub fn system() -> Self {
        Self("system".to_string())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WindowId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for WindowId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A message published on a channel.
///
/// Messages are immutable once constructed: the bus assigns the `id` (a
/// bus-wide monotonic counter) and `timestamp` at publish time, then hands
/// clones to the history log and to each subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique, monotonically increasing id assigned at publish time.
    pub id: u64,
    /// The channel this message was published on.
    pub channel: String,
    /// Message type (e.g., "ping", "state.changed").
    pub message_type: String,
    /// Arbitrary JSON payload.
    pub payload: Value,
    /// Milliseconds since the Unix epoch, captured at publish time.
    pub timestamp: u64,
    /// The window that published the message, if any.
    pub source: Option<WindowId>,
}

impl Message {
    /// Deserialize the payload into a typed struct.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| HandlerError::DecodeFailed(e.to_string()))
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
