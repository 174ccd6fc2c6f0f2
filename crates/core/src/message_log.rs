//! Ordered Chat Transcript
//!
//! The message log is the append-only list of chat turns the UI renders. Every
//! message is immutable once appended except the assistant placeholder of the
//! exchange currently in flight, which is addressed through the [`TailSlot`]
//! returned when it was appended.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The author of a chat turn.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single chat turn.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Message {
    /// Sequence id, assigned by the log at append time.
    pub id: u64,
    pub role: Role,
    pub text: String,
}

/// Handle to a message that may still be mutated.
///
/// Captured at append time so later updates hit exactly that message, even if
/// other messages with the same role exist before or after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TailSlot {
    index: usize,
    role: Role,
}

impl TailSlot {
    /// Position of the message in the log.
    pub fn index(&self) -> usize {
        self.index
    }
}

#[derive(Debug, Default, Clone)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a log from `(role, text)` pairs, numbering them from 1.
    pub fn from_history<I>(history: I) -> Self
    where
        I: IntoIterator<Item = (Role, String)>,
    {
        let mut log = Self::new();
        for (role, text) in history {
            log.append(role, text);
        }
        log
    }

    /// Appends a message and returns its sequence id.
    pub fn append(&mut self, role: Role, text: impl Into<String>) -> u64 {
        self.push(role, text.into()).1
    }

    /// Appends a message that will be mutated later and returns its slot.
    pub fn append_tail(&mut self, role: Role, text: impl Into<String>) -> TailSlot {
        self.push(role, text.into()).0
    }

    fn push(&mut self, role: Role, text: String) -> (TailSlot, u64) {
        let id = self.messages.iter().map(|m| m.id).max().unwrap_or(0) + 1;
        let index = self.messages.len();
        self.messages.push(Message { id, role, text });
        (TailSlot { index, role }, id)
    }

    /// Replaces the text of the message held by `slot`.
    ///
    /// Returns `false` and leaves the log untouched if the slot no longer
    /// points at a message of the role it was created for.
    pub fn update_tail(&mut self, slot: TailSlot, text: impl Into<String>) -> bool {
        match self.messages.get_mut(slot.index) {
            Some(message) if message.role == slot.role => {
                message.text = text.into();
                true
            }
            _ => false,
        }
    }

    /// Clones the current transcript in insertion order.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_assigns_sequential_ids() {
        let mut log = MessageLog::new();
        assert_eq!(log.append(Role::User, "hi"), 1);
        assert_eq!(log.append(Role::Assistant, "hello"), 2);
        assert_eq!(log.append(Role::User, "again"), 3);

        let ids: Vec<u64> = log.snapshot().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_update_tail_targets_recorded_slot_only() {
        let mut log = MessageLog::new();
        log.append(Role::User, "first question");
        log.append(Role::Assistant, "first answer");
        log.append(Role::User, "second question");
        let slot = log.append_tail(Role::Assistant, "");
        // A later assistant message must not be touched by the earlier slot.
        log.append(Role::Assistant, "unrelated");

        assert!(log.update_tail(slot, "second answer"));

        let messages = log.snapshot();
        assert_eq!(messages[1].text, "first answer");
        assert_eq!(messages[3].text, "second answer");
        assert_eq!(messages[4].text, "unrelated");
    }

    #[test]
    fn test_update_tail_rejects_role_mismatch() {
        let mut log = MessageLog::new();
        let slot = log.append_tail(Role::Assistant, "");
        let mut other = MessageLog::new();
        other.append(Role::User, "not an assistant turn");

        assert!(!other.update_tail(slot, "overwrite"));
        assert_eq!(other.messages()[0].text, "not an assistant turn");
        assert_eq!(slot.index(), 0);
    }

    #[test]
    fn test_from_history_numbers_from_one() {
        let log = MessageLog::from_history(vec![
            (Role::User, "q".to_string()),
            (Role::Assistant, "a".to_string()),
        ]);

        assert_eq!(log.len(), 2);
        assert_eq!(log.messages()[0].id, 1);
        assert_eq!(log.messages()[1].id, 2);
        assert_eq!(log.messages()[1].role, Role::Assistant);
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        let role: Role = serde_json::from_str("\"assistant\"").unwrap();
        assert_eq!(role, Role::Assistant);
        assert_eq!(format!("{}", Role::Assistant), "assistant");
    }
}
