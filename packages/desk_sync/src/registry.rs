//! TopicRegistry — which conversation topics are currently subscribed.
//!
//! Pure routing table: no conversation data lives here. The invariant is at
//! most one active handle per chat id; `ensure_subscribed` is idempotent by
//! construction. The registry survives disconnects so the engine can
//! re-issue subscribe frames for every known topic on reconnect.

use std::collections::HashMap;

use uuid::Uuid;

/// Opaque handle for one active subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

#[derive(Debug, Default)]
pub struct TopicRegistry {
    subs: HashMap<String, SubscriptionId>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe only if no handle exists yet for this conversation.
    /// Returns the handle and whether it was newly created; the caller emits
    /// the subscribe frame only for new handles.
    pub fn ensure_subscribed(&mut self, chat_id: &str) -> (SubscriptionId, bool) {
        if let Some(id) = self.subs.get(chat_id) {
            return (*id, false);
        }
        let id = SubscriptionId::new();
        self.subs.insert(chat_id.to_string(), id);
        (id, true)
    }

    /// Drop the handle for a conversation. Not needed during a normal
    /// session (conversations persist); used on teardown.
    pub fn forget(&mut self, chat_id: &str) -> Option<SubscriptionId> {
        self.subs.remove(chat_id)
    }

    pub fn is_subscribed(&self, chat_id: &str) -> bool {
        self.subs.contains_key(chat_id)
    }

    /// Chat ids with an active handle, for reconnect re-subscription.
    pub fn chat_ids(&self) -> impl Iterator<Item = &str> {
        self.subs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.subs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_subscribed_is_idempotent() {
        let mut reg = TopicRegistry::new();
        let (first, created) = reg.ensure_subscribed("T1");
        assert!(created);

        let (second, created) = reg.ensure_subscribed("T1");
        assert!(!created);
        assert_eq!(first, second);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn distinct_chats_get_distinct_handles() {
        let mut reg = TopicRegistry::new();
        let (a, _) = reg.ensure_subscribed("T1");
        let (b, _) = reg.ensure_subscribed("T2");
        assert_ne!(a, b);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn forget_then_resubscribe_mints_new_handle() {
        let mut reg = TopicRegistry::new();
        let (old, _) = reg.ensure_subscribed("T1");
        assert_eq!(reg.forget("T1"), Some(old));
        assert!(!reg.is_subscribed("T1"));

        let (new, created) = reg.ensure_subscribed("T1");
        assert!(created);
        assert_ne!(old, new);
    }

    #[test]
    fn forget_unknown_is_none() {
        let mut reg = TopicRegistry::new();
        assert_eq!(reg.forget("T404"), None);
    }
}
