//! Bounded conversation history.
//!
//! Turns are kept oldest first. Appending past capacity evicts the oldest
//! turn and reports it as [`MemoryEvent::Expired`] so the remote copy can be
//! deleted; every append is also reported as [`MemoryEvent::Appended`].

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::core::realtime::Role;

/// One user or assistant turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    /// Id of the remote conversation item, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    /// Unix time in milliseconds
    #[serde(default)]
    pub timestamp_ms: u64,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>, item_id: Option<String>) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self {
            role,
            content: content.into(),
            item_id,
            timestamp_ms,
        }
    }
}

/// Notifications raised by [`ConversationMemory::put`].
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryEvent {
    /// The oldest turn was evicted.
    Expired(ConversationTurn),
    /// A turn was appended.
    Appended(ConversationTurn),
}

/// FIFO history with a fixed capacity.
#[derive(Debug)]
pub struct ConversationMemory {
    turns: VecDeque<ConversationTurn>,
    capacity: usize,
    events: Option<mpsc::UnboundedSender<MemoryEvent>>,
}

impl ConversationMemory {
    /// Memory without a listener.
    pub fn new(capacity: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            events: None,
        }
    }

    /// Memory whose notifications are delivered on the returned receiver.
    pub fn with_listener(capacity: usize) -> (Self, mpsc::UnboundedReceiver<MemoryEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut memory = Self::new(capacity);
        memory.events = Some(tx);
        (memory, rx)
    }

    pub fn put(&mut self, turn: ConversationTurn) {
        self.turns.push_back(turn.clone());
        while self.turns.len() > self.capacity {
            if let Some(expired) = self.turns.pop_front() {
                self.notify(MemoryEvent::Expired(expired));
            }
        }
        self.notify(MemoryEvent::Appended(turn));
    }

    /// History, oldest first.
    pub fn get(&self) -> Vec<ConversationTurn> {
        self.turns.iter().cloned().collect()
    }

    /// Remove every turn. No notifications are raised.
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn notify(&self, event: MemoryEvent) {
        if let Some(tx) = &self.events {
            // The listener may already be gone during shutdown.
            let _ = tx.send(event);
        }
    }
}
