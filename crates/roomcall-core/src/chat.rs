//! Room chat log.
//!
//! Keeps the room's chat and system lines in a bounded ring buffer so
//! memory usage stays predictable.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Who produced a chat line, from this client's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageOrigin {
    /// Relayed back from the server after we sent it, or generated locally.
    Local,
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Chat,
    /// Joins, departures and share notices.
    System,
}

/// A single chat line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub author: String,
    pub text: String,
    pub origin: MessageOrigin,
    pub kind: MessageKind,
    pub timestamp: String,
}

impl ChatMessage {
    pub fn chat(author: impl Into<String>, text: impl Into<String>, origin: MessageOrigin) -> Self {
        Self {
            id: roomcall_common::new_id(),
            author: author.into(),
            text: text.into(),
            origin,
            kind: MessageKind::Chat,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::System,
            ..Self::chat(String::new(), text, MessageOrigin::Local)
        }
    }

    pub fn is_system(&self) -> bool {
        self.kind == MessageKind::System
    }
}

/// In-memory chat history for the current room.
pub struct ChatLog {
    capacity: usize,
    messages: VecDeque<ChatMessage>,
}

impl ChatLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            messages: VecDeque::new(),
        }
    }

    /// Push a message. The oldest message is evicted when the buffer is full.
    pub fn push(&mut self, msg: ChatMessage) {
        if self.messages.len() >= self.capacity {
            self.messages.pop_front();
        }
        self.messages.push_back(msg);
    }

    /// The most recent `limit` messages (oldest first).
    pub fn recent(&self, limit: usize) -> Vec<&ChatMessage> {
        let skip = self.messages.len().saturating_sub(limit);
        self.messages.iter().skip(skip).collect()
    }

    pub fn all(&self) -> Vec<&ChatMessage> {
        self.messages.iter().collect()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.back()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for ChatLog {
    fn default() -> Self {
        Self::new(500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_recent() {
        let mut log = ChatLog::default();
        for i in 0..5 {
            log.push(ChatMessage::chat("Ada", format!("msg {i}"), MessageOrigin::Remote));
        }
        let recent = log.recent(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].text, "msg 2");
        assert_eq!(recent[2].text, "msg 4");
    }

    #[test]
    fn ring_buffer_evicts_oldest() {
        let mut log = ChatLog::new(3);
        for i in 0..5 {
            log.push(ChatMessage::chat("Ada", format!("msg {i}"), MessageOrigin::Local));
        }
        let all = log.all();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].text, "msg 2");
    }

    #[test]
    fn system_lines_have_no_author() {
        let msg = ChatMessage::system("Bob joined.");
        assert!(msg.is_system());
        assert!(msg.author.is_empty());
    }

    #[test]
    fn clear_empties_log() {
        let mut log = ChatLog::default();
        log.push(ChatMessage::system("x"));
        log.clear();
        assert!(log.is_empty());
        assert!(log.last().is_none());
    }

    #[test]
    fn zero_capacity_keeps_latest() {
        let mut log = ChatLog::new(0);
        log.push(ChatMessage::system("a"));
        log.push(ChatMessage::system("b"));
        assert_eq!(log.len(), 1);
        assert_eq!(log.last().unwrap().text, "b");
    }
}
