//! CatchUpService — reconcile missed conversations on (re)connect.
//!
//! Runs exactly once per `Disconnected → Connected` transition: fetch the
//! open-conversations list, create a stub for each, then subscribe to each.
//! Stub creation happens-before subscription for every conversation — an
//! inbound message must never find its conversation missing from the store
//! (and even then, the store's pending buffer catches the stragglers).
//!
//! A failed fetch leaves state untouched and is retried only by the next
//! connect cycle; a missed window is otherwise closed by `admin/new-chats`
//! push notifications.

use tracing::{info, warn};

use crate::error::SyncError;
use crate::protocol::{ClientFrame, OpenTicket, chat_topic};
use crate::registry::TopicRegistry;
use crate::rest::TicketBackend;
use crate::store::ChatStore;

/// Fetch step, spawned off the engine loop so it never blocks event
/// handling. The result comes back to the engine as a `CatchUpDone` event.
pub async fn fetch_open<B: TicketBackend>(backend: &B) -> Result<Vec<OpenTicket>, SyncError> {
    backend.fetch_open_tickets().await
}

/// Apply step, run on the engine loop. For every ticket: stub first, drain
/// any early-buffered messages, then subscribe. Returns the subscribe
/// frames to publish, in order, for newly created subscriptions only.
pub fn apply(
    store: &mut ChatStore,
    registry: &mut TopicRegistry,
    tickets: Vec<OpenTicket>,
    selected: Option<&str>,
    self_identity: &str,
) -> Vec<ClientFrame> {
    let mut frames = Vec::new();
    let count = tickets.len();

    for ticket in tickets {
        store.upsert_stub(&ticket.ticket_number, &ticket.created_by, &ticket.topic);
        for early in store.take_pending(&ticket.ticket_number) {
            store.append(early, selected, self_identity);
        }

        let (_handle, created) = registry.ensure_subscribed(&ticket.ticket_number);
        if created {
            frames.push(ClientFrame::Subscribe {
                topic: chat_topic(&ticket.ticket_number),
            });
        }
    }

    info!(tickets = count, subscribed = frames.len(), "catch-up applied");
    frames
}

/// Log a failed catch-up fetch. No immediate retry.
pub fn log_failure(error: &SyncError) {
    warn!(%error, "catch-up fetch failed, waiting for next connect cycle");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ChatMessage, MessageKind};

    fn ticket(n: &str, by: &str) -> OpenTicket {
        OpenTicket {
            ticket_number: n.into(),
            created_by: by.into(),
            topic: format!("topic {n}"),
        }
    }

    #[test]
    fn apply_creates_stubs_and_subscribes_each() {
        let mut store = ChatStore::new();
        let mut registry = TopicRegistry::new();

        let frames = apply(
            &mut store,
            &mut registry,
            vec![ticket("A", "Ann"), ticket("B", "Ben"), ticket("C", "Cat")],
            None,
            "op1",
        );

        for id in ["A", "B", "C"] {
            assert!(store.get(id).unwrap().unread);
            assert!(registry.is_subscribed(id));
        }
        assert_eq!(frames.len(), 3);
        assert!(frames.contains(&ClientFrame::Subscribe {
            topic: "chat/A".into()
        }));
    }

    #[test]
    fn apply_is_idempotent_across_reconnects() {
        let mut store = ChatStore::new();
        let mut registry = TopicRegistry::new();

        apply(&mut store, &mut registry, vec![ticket("A", "Ann")], None, "op1");
        store.mark_read("A");

        // Second catch-up sees the same open ticket.
        let frames = apply(&mut store, &mut registry, vec![ticket("A", "Ann")], None, "op1");
        assert!(frames.is_empty(), "already-subscribed chats get no new frame");
        assert!(!store.get("A").unwrap().unread, "re-stub keeps read state");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn apply_flushes_early_buffered_messages() {
        let mut store = ChatStore::new();
        let mut registry = TopicRegistry::new();

        // Message raced ahead of the catch-up stub.
        store.append(
            ChatMessage {
                sender: "Ann".into(),
                content: "early".into(),
                chat_id: "A".into(),
                kind: MessageKind::Chat,
            },
            None,
            "op1",
        );

        apply(&mut store, &mut registry, vec![ticket("A", "Ann")], None, "op1");
        let convo = store.get("A").unwrap();
        assert_eq!(convo.messages.len(), 1);
        assert_eq!(convo.messages[0].content, "early");
    }
}
