//! HistoryLoader — lazy one-shot history fetch on first selection.
//!
//! "Empty log" is read as "never loaded": the fetch fires only for a known
//! conversation whose log is empty, and an in-flight set prevents a second
//! fetch while the first is pending. A conversation that legitimately has
//! zero messages gets re-fetched on reselection — a benign inefficiency,
//! since refetching an empty history is idempotent. Failures leave the log
//! empty; the operator retries by reselecting.

use std::collections::HashSet;

use tracing::warn;

use crate::error::SyncError;
use crate::store::ChatStore;

#[derive(Debug, Default)]
pub struct HistoryLoader {
    in_flight: HashSet<String>,
}

impl HistoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether selecting this conversation should trigger a fetch now.
    pub fn should_fetch(&self, store: &ChatStore, chat_id: &str) -> bool {
        !self.in_flight.contains(chat_id)
            && store
                .get(chat_id)
                .is_some_and(|convo| convo.messages.is_empty())
    }

    /// Record a fetch as started.
    pub fn begin(&mut self, chat_id: &str) {
        self.in_flight.insert(chat_id.to_string());
    }

    /// Apply a completed fetch. Success seeds the store (subject to the
    /// store's own emptiness guard); failure is logged and the log stays
    /// empty.
    pub fn complete(
        &mut self,
        store: &mut ChatStore,
        chat_id: &str,
        result: Result<Vec<crate::protocol::ChatMessage>, SyncError>,
    ) {
        self.in_flight.remove(chat_id);
        match result {
            Ok(messages) => store.set_history(chat_id, messages),
            Err(error) => {
                warn!(chat_id, %error, "history fetch failed, reselect to retry");
            }
        }
    }

    /// Forget an in-flight fetch without applying its result. Used for
    /// completions that started under an older connection epoch; the next
    /// selection refetches.
    pub fn abandon(&mut self, chat_id: &str) {
        self.in_flight.remove(chat_id);
    }

    pub fn is_in_flight(&self, chat_id: &str) -> bool {
        self.in_flight.contains(chat_id)
    }
}
