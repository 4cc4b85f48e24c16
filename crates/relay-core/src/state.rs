//! Ephemeral conversation state, keyed by chat identity.
//!
//! Users hold at most one pending intent; the administrator holds at most one of
//! "awaiting broadcast body" or "replying to X". State is lost on restart; the
//! worst case is a user re-selecting their action.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{domain::ChatId, menu::Intent};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ConversationState {
    #[default]
    Idle,
    /// A user picked a menu intent; their next text message is the payload.
    Pending(Intent),
    /// The administrator's next text message is a broadcast body.
    AwaitingBroadcast,
    /// The administrator's next text message is a reply to this user.
    ReplyingTo(ChatId),
}

impl ConversationState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Keyed get/set/clear store so routing never depends on where state lives.
///
/// `take` must be atomic: two concurrent callers never both observe the same
/// non-idle state.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get(&self, id: ChatId) -> ConversationState;

    /// Replace the state for `id`, returning the previous one.
    async fn set(&self, id: ChatId, state: ConversationState) -> ConversationState;

    /// Read and reset to `Idle` in one step.
    async fn take(&self, id: ChatId) -> ConversationState;

    async fn clear(&self, id: ChatId) {
        self.take(id).await;
    }
}

#[derive(Default)]
pub struct InMemoryConversationStore {
    inner: Mutex<HashMap<ChatId, ConversationState>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get(&self, id: ChatId) -> ConversationState {
        self.inner.lock().await.get(&id).copied().unwrap_or_default()
    }

    async fn set(&self, id: ChatId, state: ConversationState) -> ConversationState {
        let mut map = self.inner.lock().await;
        let prev = if state.is_idle() {
            map.remove(&id)
        } else {
            map.insert(id, state)
        };
        prev.unwrap_or_default()
    }

    async fn take(&self, id: ChatId) -> ConversationState {
        self.inner.lock().await.remove(&id).unwrap_or_default()
    }
}

/// One-shot tokens handed out in the admin's "reply to a user" listing.
///
/// Every listing starts a new generation; tokens from older listings and tokens
/// already redeemed are refused.
#[derive(Default)]
pub struct ReplySelection {
    inner: Mutex<SelectionBook>,
}

#[derive(Default)]
struct SelectionBook {
    generation: u64,
    tokens: HashMap<String, ChatId>,
}

impl ReplySelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh token per user, in the given order, invalidating all previous tokens.
    pub async fn issue(&self, users: &[ChatId]) -> Vec<(String, ChatId)> {
        let mut book = self.inner.lock().await;
        book.generation += 1;
        let generation = book.generation;
        book.tokens.clear();

        users
            .iter()
            .enumerate()
            .map(|(idx, &id)| {
                let token = format!("{generation}.{idx}");
                book.tokens.insert(token.clone(), id);
                (token, id)
            })
            .collect()
    }

    /// Redeem a token; each token resolves at most once. Other tokens of the
    /// same listing are left alone.
    pub async fn redeem(&self, token: &str) -> Option<ChatId> {
        self.inner.lock().await.tokens.remove(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn set_overwrites_and_take_consumes_once() {
        let store = InMemoryConversationStore::new();
        let alice = ChatId(1);

        assert_eq!(store.get(alice).await, ConversationState::Idle);
        store
            .set(alice, ConversationState::Pending(Intent::ModRequest))
            .await;
        let prev = store
            .set(alice, ConversationState::Pending(Intent::FeatureSuggestion))
            .await;
        assert_eq!(prev, ConversationState::Pending(Intent::ModRequest));

        assert_eq!(
            store.take(alice).await,
            ConversationState::Pending(Intent::FeatureSuggestion)
        );
        assert_eq!(store.take(alice).await, ConversationState::Idle);
        assert_eq!(store.get(alice).await, ConversationState::Idle);
    }

    #[tokio::test]
    async fn concurrent_takes_observe_target_once() {
        let store = Arc::new(InMemoryConversationStore::new());
        let admin = ChatId(99);
        store
            .set(admin, ConversationState::ReplyingTo(ChatId(5)))
            .await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.take(admin).await }));
        }

        let mut seen = 0;
        for h in handles {
            if h.await.unwrap() == ConversationState::ReplyingTo(ChatId(5)) {
                seen += 1;
            }
        }
        assert_eq!(seen, 1);
    }

    #[tokio::test]
    async fn reply_tokens_are_one_shot_and_regenerated_per_listing() {
        let sel = ReplySelection::new();
        let first = sel.issue(&[ChatId(10), ChatId(20)]).await;
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].1, ChatId(20));

        let second = sel.issue(&[ChatId(10), ChatId(20)]).await;
        assert_ne!(first[0].0, second[0].0);

        // Stale listing.
        assert_eq!(sel.redeem(&first[0].0).await, None);
        // Fresh token resolves once.
        assert_eq!(sel.redeem(&second[1].0).await, Some(ChatId(20)));
        assert_eq!(sel.redeem(&second[1].0).await, None);
        // Siblings from the same listing stay usable.
        assert_eq!(sel.redeem(&second[0].0).await, Some(ChatId(10)));
    }
}
