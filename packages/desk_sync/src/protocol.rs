//! Wire Protocol Types
//!
//! Message types for the multiplexed real-time connection and the REST
//! collaborators. All wire payloads are camelCase JSON; frames are tagged
//! enums so the reader can route without peeking into bodies.

use serde::{Deserialize, Serialize};

/// Broadcast topic announcing freshly opened conversations.
pub const NEW_CHATS_TOPIC: &str = "admin/new-chats";

/// The single send-destination accepting operator-authored messages.
pub const SEND_DESTINATION: &str = "app/chat";

/// Per-conversation message stream topic.
pub fn chat_topic(chat_id: &str) -> String {
    format!("chat/{chat_id}")
}

/// Extract the chat id from a per-conversation topic name.
pub fn chat_id_from_topic(topic: &str) -> Option<&str> {
    topic.strip_prefix("chat/")
}

/// Kind discriminator on chat messages. `Join` marks a party entering the
/// conversation; everything the operator sends is `Chat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    Chat,
    Join,
}

/// One message in a conversation. Immutable once received; ordering within
/// a conversation is arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub sender: String,
    pub content: String,
    pub chat_id: String,
    pub kind: MessageKind,
}

/// Payload of `admin/new-chats`: a party just opened a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChatNotice {
    pub chat_id: String,
    pub participant_label: String,
    pub summary: String,
}

/// One row of the open-conversations REST fetch: a conversation with
/// unresolved activity, discovered during catch-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenTicket {
    pub ticket_number: String,
    pub created_by: String,
    pub topic: String,
}

/// Frames sent FROM the console TO the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Start receiving messages published to `topic`.
    Subscribe { topic: String },
    /// Stop receiving messages for `topic`.
    Unsubscribe { topic: String },
    /// Post an operator message to a destination.
    Send {
        destination: String,
        message: ChatMessage,
    },
}

/// Frames sent FROM the server TO the console.
///
/// The body stays a raw `Value` here; the engine parses it against the
/// topic's expected payload so one malformed body never takes down the
/// reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Message {
        topic: String,
        body: serde_json::Value,
    },
}
