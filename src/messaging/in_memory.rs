//! # In-Memory Broker
//!
//! Channel-backed [`MessageBroker`] for tests and local pipeline checks.
//! The paired [`InMemoryBrokerHandle`] plays the producer side: it publishes
//! messages, partition-EOF markers and transient errors, and can observe
//! whether the consumer closed its subscription.

use super::errors::{MessagingError, MessagingResult};
use super::message::{MessageBroker, PollResult, RawMessage};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug)]
enum BrokerEvent {
    Message(RawMessage),
    PartitionEof(i32),
    Error(String),
}

#[derive(Debug, Default)]
struct SharedState {
    subscriptions: RwLock<HashSet<String>>,
    next_offsets: Mutex<HashMap<(String, i32), i64>>,
    closed: AtomicBool,
}

/// Consumer side, owned by the consumer loop
#[derive(Debug)]
pub struct InMemoryBroker {
    receiver: mpsc::UnboundedReceiver<BrokerEvent>,
    state: Arc<SharedState>,
}

/// Producer side
#[derive(Debug, Clone)]
pub struct InMemoryBrokerHandle {
    sender: mpsc::UnboundedSender<BrokerEvent>,
    state: Arc<SharedState>,
}

impl InMemoryBroker {
    pub fn new() -> (Self, InMemoryBrokerHandle) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let state = Arc::new(SharedState::default());
        (
            Self {
                receiver,
                state: Arc::clone(&state),
            },
            InMemoryBrokerHandle { sender, state },
        )
    }
}

impl InMemoryBrokerHandle {
    /// Publish to partition 0. Returns the assigned offset.
    pub fn publish(&self, topic: &str, payload: impl Into<Vec<u8>>) -> MessagingResult<i64> {
        self.publish_to(topic, 0, payload)
    }

    pub fn publish_to(
        &self,
        topic: &str,
        partition: i32,
        payload: impl Into<Vec<u8>>,
    ) -> MessagingResult<i64> {
        let offset = {
            let mut offsets = self.state.next_offsets.lock();
            let next = offsets.entry((topic.to_string(), partition)).or_insert(0);
            let offset = *next;
            *next += 1;
            offset
        };
        let message = RawMessage::new(topic, partition, offset, payload.into());
        self.send(BrokerEvent::Message(message))?;
        Ok(offset)
    }

    pub fn publish_partition_eof(&self, partition: i32) -> MessagingResult<()> {
        self.send(BrokerEvent::PartitionEof(partition))
    }

    /// Make the next poll fail with a transient consume error
    pub fn inject_error(&self, message: impl Into<String>) -> MessagingResult<()> {
        self.send(BrokerEvent::Error(message.into()))
    }

    pub fn subscriptions(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.state.subscriptions.read().iter().cloned().collect();
        topics.sort();
        topics
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::Acquire)
    }

    fn send(&self, event: BrokerEvent) -> MessagingResult<()> {
        self.sender.send(event).map_err(|_| MessagingError::Closed)
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn subscribe(&mut self, topics: &[String]) -> MessagingResult<()> {
        if topics.is_empty() {
            return Err(MessagingError::subscription(topics, "no topics to subscribe to"));
        }
        let mut subscriptions = self.state.subscriptions.write();
        subscriptions.clear();
        subscriptions.extend(topics.iter().cloned());
        Ok(())
    }

    async fn poll(&mut self) -> MessagingResult<PollResult> {
        if self.state.closed.load(Ordering::Acquire) {
            return Err(MessagingError::Closed);
        }
        loop {
            let Some(event) = self.receiver.recv().await else {
                // Every producer handle is gone; behave like an idle broker
                std::future::pending::<()>().await;
                continue;
            };
            match event {
                BrokerEvent::Message(message) => {
                    if self.state.subscriptions.read().contains(&message.topic) {
                        return Ok(PollResult::Message(message));
                    }
                    debug!(topic = %message.topic, "Skipping message for unsubscribed topic");
                }
                BrokerEvent::PartitionEof(partition) => {
                    return Ok(PollResult::PartitionEof { partition })
                }
                BrokerEvent::Error(message) => return Err(MessagingError::consume(message)),
            }
        }
    }

    async fn close(&mut self) -> MessagingResult<()> {
        self.state.subscriptions.write().clear();
        self.state.closed.store(true, Ordering::Release);
        self.receiver.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offsets_increase_per_partition() {
        let (mut broker, handle) = InMemoryBroker::new();
        broker.subscribe(&["a".to_string()]).await.unwrap();

        assert_eq!(handle.publish("a", "1").unwrap(), 0);
        assert_eq!(handle.publish("a", "2").unwrap(), 1);
        assert_eq!(handle.publish_to("a", 3, "3").unwrap(), 0);

        let PollResult::Message(first) = broker.poll().await.unwrap() else {
            panic!("expected a message");
        };
        assert_eq!((first.partition, first.offset), (0, 0));
    }

    #[tokio::test]
    async fn test_unsubscribed_topics_are_skipped() {
        let (mut broker, handle) = InMemoryBroker::new();
        broker.subscribe(&["wanted".to_string()]).await.unwrap();

        handle.publish("ignored", "x").unwrap();
        handle.publish("wanted", "y").unwrap();

        match broker.poll().await.unwrap() {
            PollResult::Message(msg) => assert_eq!(msg.topic, "wanted"),
            other => panic!("unexpected poll result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_eof_and_error_events() {
        let (mut broker, handle) = InMemoryBroker::new();
        broker.subscribe(&["t".to_string()]).await.unwrap();

        handle.publish_partition_eof(2).unwrap();
        handle.inject_error("transport hiccup").unwrap();

        assert_eq!(
            broker.poll().await.unwrap(),
            PollResult::PartitionEof { partition: 2 }
        );
        assert!(matches!(
            broker.poll().await,
            Err(MessagingError::Consume { .. })
        ));
    }

    #[tokio::test]
    async fn test_close_is_observable() {
        let (mut broker, handle) = InMemoryBroker::new();
        broker.subscribe(&["t".to_string()]).await.unwrap();
        assert_eq!(handle.subscriptions(), vec!["t"]);

        broker.close().await.unwrap();
        assert!(handle.is_closed());
        assert!(handle.subscriptions().is_empty());
        assert!(matches!(broker.poll().await, Err(MessagingError::Closed)));
    }
}
