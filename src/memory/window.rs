//! Bounded message window
//!
//! A capacity-limited conversation timeline with strict FIFO eviction.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Author of a message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
    ToolResult,
}

/// A single conversation message. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    pub fn tool_result(text: impl Into<String>) -> Self {
        Self::new(Role::ToolResult, text)
    }
}

/// Ordered message history holding at most `capacity` messages.
///
/// Windows are shared as `Arc<MessageWindow>` handles handed out by the
/// [`MemoryStore`](crate::memory::MemoryStore); the inner lock only guards
/// against corruption; a window has one logical writer per turn.
#[derive(Debug)]
pub struct MessageWindow {
    capacity: usize,
    messages: RwLock<VecDeque<Message>>,
}

impl MessageWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            messages: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append a message, evicting the oldest one first when full.
    pub fn append(&self, message: Message) {
        if self.capacity == 0 {
            return;
        }

        let mut messages = self.messages.write();
        if messages.len() == self.capacity {
            messages.pop_front();
        }
        messages.push_back(message);
    }

    /// Snapshot of the timeline in append order.
    pub fn messages(&self) -> Vec<Message> {
        self.messages.read().iter().cloned().collect()
    }

    pub fn last(&self) -> Option<Message> {
        self.messages.read().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
