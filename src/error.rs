//! Error types for bus operations.

use std::error::Error;
use std::fmt;

/// Error raised inside a subscriber callback or service method handler.
///
/// Callback failures during `publish` are contained at the dispatch loop —
/// logged, never re-thrown to the publisher. Service handler failures
/// propagate to the caller wrapped in [`BusError::Handler`].
#[derive(Debug)]
pub enum HandlerError {
    /// Payload decode / deserialization failed.
    DecodeFailed(String),
    /// The handler rejected the message or call (validation, bad state).
    Rejected(String),
    /// Other error.
    Other(Box<dyn Error + Send + Sync>),
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::DecodeFailed(msg) => write!(f, "decode failed: {}", msg),
            HandlerError::Rejected(msg) => write!(f, "rejected: {}", msg),
            HandlerError::Other(e) => write!(f, "handler error: {}", e),
        }
    }
}

impl Error for HandlerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            HandlerError::Other(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::DecodeFailed(err.to_string())
    }
}

/// Error type for bus operations that can fail at the caller.
#[derive(Debug)]
pub enum BusError {
    /// No service registered under this name.
    ServiceNotFound(String),
    /// The service exists but has no such method.
    MethodNotFound {
        /// Service that was called.
        service: String,
        /// Method that was missing.
        method: String,
    },
    /// No response arrived before the request deadline.
    RequestTimeout {
        /// Channel the request was published on.
        channel: String,
        /// The timeout that elapsed, in milliseconds.
        timeout_ms: u64,
    },
    /// A service method handler failed.
    Handler(HandlerError),
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusError::ServiceNotFound(name) => write!(f, "service not found: {}", name),
            BusError::MethodNotFound { service, method } => {
                write!(f, "method not found: {}.{}", service, method)
            }
            BusError::RequestTimeout {
                channel,
                timeout_ms,
            } => write!(
                f,
                "request on channel {} timed out after {}ms",
                channel, timeout_ms
            ),
            BusError::Handler(e) => write!(f, "handler failed: {}", e),
        }
    }
}

impl Error for BusError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BusError::Handler(e) => Some(e),
            _ => None,
        }
    }
}

impl From<HandlerError> for BusError {
    fn from(err: HandlerError) -> Self {
        BusError::Handler(err)
    }
}
