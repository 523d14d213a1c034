//! What each upload session has ingested, for `GET /api/parsed-data/{id}`.
//!
//! Bounded like the chat sessions: entries idle past the TTL are purged by
//! a janitor and the oldest entry is evicted once the cap is reached.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

struct Entry {
    /// message type -> rows ingested
    counts: BTreeMap<String, usize>,
    last_used: Instant,
}

pub struct IngestLog {
    entries: RwLock<HashMap<String, Entry>>,
    idle_ttl: Duration,
    max_sessions: usize,
}

impl IngestLog {
    pub fn new(idle_ttl: Duration, max_sessions: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
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

    /// Record `rows` for `message_type`, replacing any earlier count.
    pub async fn record(&self, session_id: &str, message_type: &str, rows: usize) {
        let mut entries = self.entries.write().await;
        let now = Instant::now();

        if !entries.contains_key(session_id) && entries.len() >= self.max_sessions {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
                debug!(session_id = %oldest, "Evicted oldest ingest record");
            }
        }

        let entry = entries.entry(session_id.to_string()).or_insert_with(|| Entry {
            counts: BTreeMap::new(),
            last_used: now,
        });
        entry.last_used = now;
        entry.counts.insert(message_type.to_string(), rows);
    }

    pub async fn counts(&self, session_id: &str) -> Option<BTreeMap<String, usize>> {
        self.entries
            .read()
            .await
            .get(session_id)
            .map(|e| e.counts.clone())
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        let ttl = self.idle_ttl;
        entries.retain(|_, e| e.last_used.elapsed() <= ttl);
        let purged = before - entries.len();
        if purged > 0 {
            info!(purged, remaining = entries.len(), "Purged idle ingest records");
        }
        purged
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Purge idle entries every `every` until the log is dropped.
    pub fn spawn_janitor(self: &Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let log = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(log) = log.upgrade() else {
                    break;
                };
                log.purge_expired().await;
            }
        })
    }
}
