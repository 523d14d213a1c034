//! Domain event system: observe what an agent chain is doing.
//!
//! The agent loop publishes an event for every LLM call, every query it
//! runs and every chain it finishes. Subscribers are optional.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Something observable that happened while serving a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// The LLM answered (possibly after retries)
    ResponseGenerated {
        session_id: String,
        model: String,
        depth: u32,
        attempts: u32,
        tokens_used: u32,
        timestamp: DateTime<Utc>,
    },

    /// A directive's SQL reached the store
    QueryExecuted {
        session_id: String,
        rows: usize,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Flight-log data was loaded into a table
    DataIngested {
        table: String,
        rows: usize,
        timestamp: DateTime<Utc>,
    },

    /// An agent chain produced its terminal reply
    ChainFinished {
        session_id: String,
        llm_calls: u32,
        success: bool,
        timestamp: DateTime<Utc>,
    },
}

/// Fan-out of domain events over `tokio::sync::broadcast`. Slow
/// subscribers lag and lose the oldest events; publishers never block.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// `capacity` events are buffered per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: DomainEvent) {
        // send only fails when nobody is listening
        let _ = self.sender.send(Arc::new(event));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_sees_query_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::QueryExecuted {
            session_id: "s1".into(),
            rows: 3,
            success: true,
            duration_ms: 42,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::QueryExecuted { rows, success, .. } => {
                assert_eq!(*rows, 3);
                assert!(success);
            }
            _ => panic!("Expected QueryExecuted event"),
        }
    }

    #[test]
    fn publishing_without_subscribers_is_silent() {
        let bus = EventBus::default();
        bus.publish(DomainEvent::DataIngested {
            table: "GPS".into(),
            rows: 0,
            timestamp: Utc::now(),
        });
    }
}
