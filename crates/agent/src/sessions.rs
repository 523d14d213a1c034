//! Session-keyed conversation store.
//!
//! Each session owns its own [`Conversation`] behind an async mutex. A chat
//! request holds that mutex for its whole chain, so requests on one session
//! serialize while different sessions proceed independently.

use skylog_core::message::{Conversation, SessionId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info};

pub type SharedConversation = Arc<Mutex<Conversation>>;

struct Entry {
    conversation: SharedConversation,
    last_used: Instant,
}

/// Maps session ids to conversations, with idle expiry and an LRU cap.
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Entry>>,
    idle_ttl: Duration,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(idle_ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    pub fn from_config(config: &skylog_config::SessionConfig) -> Self {
        Self::new(
            Duration::from_secs(config.idle_ttl_secs),
            config.max_sessions,
        )
    }

    /// Fetch the session's conversation, creating it on first use.
    ///
    /// Creating past the cap evicts the least recently used session.
    pub async fn get_or_create(&self, id: &SessionId) -> SharedConversation {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();

        if let Some(entry) = sessions.get_mut(id) {
            entry.last_used = now;
            return entry.conversation.clone();
        }

        if sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                sessions.remove(&oldest);
                debug!(session_id = %oldest, "Evicted least recently used session");
            }
        }

        let conversation = Arc::new(Mutex::new(Conversation::new()));
        sessions.insert(
            id.clone(),
            Entry {
                conversation: conversation.clone(),
                last_used: now,
            },
        );
        debug!(session_id = %id, total = sessions.len(), "Created session");
        conversation
    }

    /// Look up a session without creating or touching it.
    pub async fn get(&self, id: &SessionId) -> Option<SharedConversation> {
        self.sessions
            .read()
            .await
            .get(id)
            .map(|e| e.conversation.clone())
    }

    /// Empty a session's history. Returns `false` for unknown sessions.
    pub async fn clear(&self, id: &SessionId) -> bool {
        let Some(conversation) = self.get(id).await else {
            return false;
        };
        conversation.lock().await.clear();
        true
    }

    /// Tear a session down.
    pub async fn remove(&self, id: &SessionId) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    /// Drop sessions idle longer than the TTL. Returns how many went.
    pub async fn purge_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        let ttl = self.idle_ttl;
        sessions.retain(|_, e| e.last_used.elapsed() <= ttl);
        let purged = before - sessions.len();
        if purged > 0 {
            info!(purged, remaining = sessions.len(), "Purged idle sessions");
        }
        purged
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Purge idle sessions every `every` until the store is dropped.
    pub fn spawn_janitor(self: &Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let store = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                store.purge_expired().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(s: &str) -> SessionId {
        SessionId::from(s)
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = SessionStore::new(Duration::from_secs(60), 10);
        store.get_or_create(&sid("a")).await.lock().await.append("from a");

        let b = store.get_or_create(&sid("b")).await;
        assert!(b.lock().await.is_empty());

        let a = store.get(&sid("a")).await.unwrap();
        assert_eq!(a.lock().await.len(), 1);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn get_or_create_returns_same_conversation() {
        let store = SessionStore::new(Duration::from_secs(60), 10);
        let first = store.get_or_create(&sid("a")).await;
        let second = store.get_or_create(&sid("a")).await;
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn clear_and_remove() {
        let store = SessionStore::new(Duration::from_secs(60), 10);
        store.get_or_create(&sid("a")).await.lock().await.append("hi");

        assert!(store.clear(&sid("a")).await);
        assert!(store.get(&sid("a")).await.unwrap().lock().await.is_empty());
        assert!(!store.clear(&sid("missing")).await);

        assert!(store.remove(&sid("a")).await);
        assert!(store.get(&sid("a")).await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_drops_idle_sessions() {
        let store = SessionStore::new(Duration::from_secs(60), 10);
        store.get_or_create(&sid("old")).await;
        tokio::time::advance(Duration::from_secs(45)).await;
        store.get_or_create(&sid("fresh")).await;
        tokio::time::advance(Duration::from_secs(30)).await;

        assert_eq!(store.purge_expired().await, 1);
        assert!(store.get(&sid("old")).await.is_none());
        assert!(store.get(&sid("fresh")).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn cap_evicts_least_recently_used() {
        let store = SessionStore::new(Duration::from_secs(3600), 2);
        store.get_or_create(&sid("a")).await;
        tokio::time::advance(Duration::from_secs(1)).await;
        store.get_or_create(&sid("b")).await;
        tokio::time::advance(Duration::from_secs(1)).await;
        // Touch "a" so "b" becomes the oldest.
        store.get_or_create(&sid("a")).await;
        tokio::time::advance(Duration::from_secs(1)).await;
        store.get_or_create(&sid("c")).await;

        assert_eq!(store.len().await, 2);
        assert!(store.get(&sid("a")).await.is_some());
        assert!(store.get(&sid("b")).await.is_none());
        assert!(store.get(&sid("c")).await.is_some());
    }
}
