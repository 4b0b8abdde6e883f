//! ChatStore — the master state.
//!
//! Authoritative map from conversation id to conversation state, mutated
//! only through the transition methods below. The store is owned by the
//! engine task, so every method call is one atomic step from the event
//! loop's perspective and no locking is needed.
//!
//! Messages that arrive before their conversation's stub exists are held in
//! a bounded per-conversation buffer and flushed when the stub appears,
//! instead of being silently dropped.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, warn};

use crate::protocol::ChatMessage;

/// Cap on buffered early messages per conversation. Overflow evicts the
/// oldest buffered message.
const PENDING_CAP: usize = 64;

/// One support conversation. Never deleted during a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub participant_label: String,
    pub summary: String,
    /// Append-only from the client's perspective; insertion order is
    /// arrival order. No reordering or dedup is attempted.
    pub messages: Vec<ChatMessage>,
    pub unread: bool,
}

/// Outcome of [`ChatStore::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Attached to a known conversation.
    Appended,
    /// No stub yet — held in the pending buffer.
    Buffered,
}

#[derive(Debug, Default)]
pub struct ChatStore {
    conversations: HashMap<String, Conversation>,
    pending: HashMap<String, VecDeque<ChatMessage>>,
}

impl ChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the conversation with an empty log and `unread = true` if it
    /// is absent. First-write-wins: a second stub for the same id is a
    /// no-op. Returns true when the conversation was created.
    pub fn upsert_stub(
        &mut self,
        chat_id: &str,
        participant_label: &str,
        summary: &str,
    ) -> bool {
        if self.conversations.contains_key(chat_id) {
            return false;
        }
        self.conversations.insert(
            chat_id.to_string(),
            Conversation {
                participant_label: participant_label.to_string(),
                summary: summary.to_string(),
                messages: Vec::new(),
                unread: true,
            },
        );
        debug!(chat_id, "conversation stub created");
        true
    }

    /// Append a message to its conversation's log. Unknown conversations
    /// buffer the message until a stub appears (see [`take_pending`]).
    ///
    /// Unread becomes true when the sender is not the operator and the
    /// conversation is not the currently selected one; it is never cleared
    /// here.
    ///
    /// [`take_pending`]: ChatStore::take_pending
    pub fn append(
        &mut self,
        message: ChatMessage,
        selected: Option<&str>,
        self_identity: &str,
    ) -> AppendOutcome {
        let Some(convo) = self.conversations.get_mut(&message.chat_id) else {
            let buf = self.pending.entry(message.chat_id.clone()).or_default();
            if buf.len() >= PENDING_CAP {
                warn!(
                    chat_id = %message.chat_id,
                    "pending buffer full, evicting oldest early message"
                );
                buf.pop_front();
            }
            buf.push_back(message);
            return AppendOutcome::Buffered;
        };

        let foreign = message.sender != self_identity;
        let unselected = selected != Some(message.chat_id.as_str());
        convo.unread = convo.unread || (foreign && unselected);
        convo.messages.push(message);
        AppendOutcome::Appended
    }

    /// Drain buffered early messages for a conversation, in arrival order.
    /// Called by the engine right after `upsert_stub` so nothing is lost to
    /// the stub/subscription race.
    pub fn take_pending(&mut self, chat_id: &str) -> Vec<ChatMessage> {
        self.pending
            .remove(chat_id)
            .map(|q| q.into_iter().collect())
            .unwrap_or_default()
    }

    /// Replace the conversation's log wholesale. Used exactly once per
    /// conversation, by the history loader. Guarded: a no-op when the log
    /// is already non-empty (protects against double-fetch) or the
    /// conversation is unknown.
    pub fn set_history(&mut self, chat_id: &str, messages: Vec<ChatMessage>) {
        match self.conversations.get_mut(chat_id) {
            Some(convo) if convo.messages.is_empty() => {
                convo.messages = messages;
            }
            Some(_) => {
                debug!(chat_id, "history already present, fetch result ignored");
            }
            None => {
                debug!(chat_id, "history for unknown conversation ignored");
            }
        }
    }

    /// Clear the unread flag. No-op for absent ids.
    pub fn mark_read(&mut self, chat_id: &str) {
        if let Some(convo) = self.conversations.get_mut(chat_id) {
            convo.unread = false;
        }
    }

    pub fn get(&self, chat_id: &str) -> Option<&Conversation> {
        self.conversations.get(chat_id)
    }

    pub fn contains(&self, chat_id: &str) -> bool {
        self.conversations.contains_key(chat_id)
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Conversation)> {
        self.conversations.iter()
    }
}
