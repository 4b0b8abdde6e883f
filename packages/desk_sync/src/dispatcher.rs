//! Dispatcher — outbound operator messages.
//!
//! Holds the operator's input buffer and publishes it to the send
//! destination when every precondition holds: non-blank content, a selected
//! conversation, and a live connection. On any failure the buffer is
//! retained so the operator can retry by resubmitting; nothing is queued.
//!
//! There is no optimistic local insert: the sent message appears in the
//! transcript only when the server echoes it back over the subscribed
//! topic, keeping the store the single source of truth for ordering.

use tracing::debug;

use crate::connection::FrameSink;
use crate::protocol::{ChatMessage, ClientFrame, MessageKind, SEND_DESTINATION};

#[derive(Debug)]
pub struct Dispatcher {
    identity: String,
    input: String,
}

impl Dispatcher {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            input: String::new(),
        }
    }

    pub fn set_input(&mut self, input: String) {
        self.input = input;
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Publish the current input to the selected conversation. Returns true
    /// (and clears the buffer) only when the frame was actually handed to
    /// the transport.
    pub fn send(&mut self, selected: Option<&str>, sink: &impl FrameSink) -> bool {
        let content = self.input.trim();
        if content.is_empty() {
            return false;
        }
        let Some(chat_id) = selected else {
            debug!("send with no conversation selected, ignoring");
            return false;
        };

        let message = ChatMessage {
            sender: self.identity.clone(),
            content: content.to_string(),
            chat_id: chat_id.to_string(),
            kind: MessageKind::Chat,
        };
        match sink.publish(ClientFrame::Send {
            destination: SEND_DESTINATION.to_string(),
            message,
        }) {
            Ok(()) => {
                self.input.clear();
                true
            }
            Err(e) => {
                // Input stays put; the operator retries by resubmitting.
                debug!(error = %e, "message not sent");
                false
            }
        }
    }
}
