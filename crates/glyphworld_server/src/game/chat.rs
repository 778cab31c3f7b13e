//! # Chat
//!
//! Bounded history plus per-player delivery callbacks.

use std::collections::VecDeque;

/// One chat line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    /// Sender's player id.
    pub from: String,
    /// Sender's display name.
    pub username: String,
    /// Message text.
    pub text: String,
    /// Tick at which it was sent.
    pub tick: u64,
}

/// Delivers a chat line to one player.
pub type ChatCallback = Box<dyn FnMut(&ChatMessage) + Send>;

/// Most recent messages, oldest first.
#[derive(Debug)]
pub struct ChatLog {
    capacity: usize,
    messages: VecDeque<ChatMessage>,
}

impl ChatLog {
    /// Creates a log holding at most `capacity` messages.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            messages: VecDeque::with_capacity(capacity),
        }
    }

    /// Appends, dropping the oldest message past capacity.
    pub fn push(&mut self, message: ChatMessage) {
        if self.messages.len() == self.capacity {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
    }

    /// Messages, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    /// Newest message.
    #[must_use]
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.back()
    }

    /// Number of messages held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether nothing has been said.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> ChatMessage {
        ChatMessage {
            from: "p".into(),
            username: "p".into(),
            text: n.to_string(),
            tick: n as u64,
        }
    }

    #[test]
    fn test_ring_drops_oldest() {
        let mut log = ChatLog::new(50);
        for n in 0..60 {
            log.push(line(n));
        }
        assert_eq!(log.len(), 50);
        assert_eq!(log.iter().next().map(|m| m.text.as_str()), Some("10"));
        assert_eq!(log.last().map(|m| m.text.as_str()), Some("59"));
    }
}
