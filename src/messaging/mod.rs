//! # Messaging Module
//!
//! Broker abstraction, the in-memory and Kafka implementations, and the
//! consumer loop feeding the dispatcher.

pub mod consumer;
pub mod errors;
pub mod in_memory;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod message;

pub use consumer::{ConsumerSummary, EventConsumer};
pub use errors::{MessagingError, MessagingResult};
pub use in_memory::{InMemoryBroker, InMemoryBrokerHandle};
#[cfg(feature = "kafka")]
pub use kafka::KafkaBroker;
pub use message::{MessageBroker, PollResult, RawMessage};
