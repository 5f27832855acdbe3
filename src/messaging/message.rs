use super::errors::MessagingResult;
use async_trait::async_trait;

/// One message as delivered by the broker. Discarded once dispatch returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Vec<u8>,
}

impl RawMessage {
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            payload,
        }
    }

    /// Payload as text for log output
    pub fn payload_preview(&self, max_len: usize) -> String {
        let text = String::from_utf8_lossy(&self.payload);
        if text.chars().count() <= max_len {
            text.into_owned()
        } else {
            let cut: String = text.chars().take(max_len).collect();
            format!("{cut}...")
        }
    }
}

/// Result of a single poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResult {
    Message(RawMessage),
    /// The consumer reached the current end of a partition. Not an error.
    PartitionEof { partition: i32 },
}

/// Broker subscription owned by the consumer loop
#[async_trait]
pub trait MessageBroker: Send {
    /// Subscribe to the fixed topic set
    async fn subscribe(&mut self, topics: &[String]) -> MessagingResult<()>;

    /// Wait for the next message or partition marker.
    ///
    /// Must be cancel-safe: the consumer loop drops the future when shutdown
    /// is requested.
    async fn poll(&mut self) -> MessagingResult<PollResult>;

    /// Leave the consumer group and release the subscription
    async fn close(&mut self) -> MessagingResult<()>;
}
