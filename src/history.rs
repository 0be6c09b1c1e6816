//! Message history log — a bounded, FIFO-evicting record of every publish.
//!
//! Monitoring and introspection programs read this to show recent bus
//! traffic. The log never exceeds its cap: once full, recording a message
//! evicts the oldest entry.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use crate::message::Message;

/// Bounded ring of recently published messages.
///
/// Cloning is cheap and shares the underlying ring.
#[derive(Clone)]
pub struct MessageHistory {
    ring: Arc<RwLock<VecDeque<Message>>>,
    cap: usize,
}

impl MessageHistory {
    /// Create a history log retaining at most `cap` messages.
    pub fn new(cap: usize) -> Self {
        Self {
            ring: Arc::new(RwLock::new(VecDeque::with_capacity(cap))),
            cap,
        }
    }

    /// Record a published message, evicting the oldest entry when full.
    pub fn record(&self, message: &Message) {
        let mut ring = self.ring.write().unwrap();
        ring.push_back(message.clone());
        while ring.len() > self.cap {
            ring.pop_front();
        }
    }

    /// All retained messages, oldest first.
    pub fn messages(&self) -> Vec<Message> {
        self.ring.read().unwrap().iter().cloned().collect()
    }

    /// Find the most recent message with the given type.
    pub fn find_by_type(&self, message_type: &str) -> Option<Message> {
        self.ring
            .read()
            .unwrap()
            .iter()
            .rev()
            .find(|m| m.message_type == message_type)
            .cloned()
    }

    /// Number of retained messages.
    pub fn len(&self) -> usize {
        self.ring.read().unwrap().len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.ring.read().unwrap().is_empty()
    }

    /// The retention cap.
    pub fn cap(&self) -> usize {
        self.cap
    }
}
