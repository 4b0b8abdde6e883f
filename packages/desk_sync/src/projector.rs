//! ViewProjector — derived, read-only views over the master store.
//!
//! `project` yields the selected conversation's transcript; `chat_list`
//! yields the sidebar feed. Both are pure functions of (store, selection);
//! the engine republishes them through watch channels after every event, so
//! the visible transcript tracks background arrivals without reselection.

use crate::protocol::ChatMessage;
use crate::store::ChatStore;

/// One row of the conversation list shown next to the transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatListEntry {
    pub chat_id: String,
    pub participant_label: String,
    pub summary: String,
    pub unread: bool,
}

/// The message log of the selected conversation, or empty when nothing is
/// selected or the conversation is absent.
pub fn project(store: &ChatStore, selected: Option<&str>) -> Vec<ChatMessage> {
    selected
        .and_then(|id| store.get(id))
        .map(|convo| convo.messages.clone())
        .unwrap_or_default()
}

/// All conversations, ordered by chat id for a stable presentation.
pub fn chat_list(store: &ChatStore) -> Vec<ChatListEntry> {
    let mut entries: Vec<ChatListEntry> = store
        .iter()
        .map(|(chat_id, convo)| ChatListEntry {
            chat_id: chat_id.clone(),
            participant_label: convo.participant_label.clone(),
            summary: convo.summary.clone(),
            unread: convo.unread,
        })
        .collect();
    entries.sort_by(|a, b| a.chat_id.cmp(&b.chat_id));
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MessageKind;

    fn msg(sender: &str, content: &str, chat_id: &str) -> ChatMessage {
        ChatMessage {
            sender: sender.into(),
            content: content.into(),
            chat_id: chat_id.into(),
            kind: MessageKind::Chat,
        }
    }

    #[test]
    fn project_nothing_selected_is_empty() {
        let store = ChatStore::new();
        assert!(project(&store, None).is_empty());
    }

    #[test]
    fn project_absent_conversation_is_empty() {
        let mut store = ChatStore::new();
        store.upsert_stub("T1", "Alice", "s");
        assert!(project(&store, Some("T404")).is_empty());
    }

    #[test]
    fn project_returns_only_the_selected_log() {
        let mut store = ChatStore::new();
        store.upsert_stub("T1", "Alice", "s");
        store.upsert_stub("T2", "Bob", "s");
        store.append(msg("Alice", "for t1", "T1"), None, "op1");
        store.append(msg("Bob", "for t2", "T2"), None, "op1");

        let view = project(&store, Some("T2"));
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].content, "for t2");
    }

    #[test]
    fn chat_list_is_sorted_and_carries_unread() {
        let mut store = ChatStore::new();
        store.upsert_stub("T2", "Bob", "b");
        store.upsert_stub("T1", "Alice", "a");
        store.mark_read("T1");

        let list = chat_list(&store);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].chat_id, "T1");
        assert!(!list[0].unread);
        assert_eq!(list[1].chat_id, "T2");
        assert!(list[1].unread);
    }
}
