//! # Messaging Error Types
//!
//! Broker-side failures. Everything except a failed subscription is treated
//! as transient by the consumer loop.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Broker connection error: {message}")]
    Connection { message: String },

    #[error("Subscription to {topics:?} failed: {message}")]
    Subscription { topics: Vec<String>, message: String },

    #[error("Consume error: {message}")]
    Consume { message: String },

    #[error("Broker subscription is closed")]
    Closed,
}

impl MessagingError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn subscription(topics: &[String], message: impl Into<String>) -> Self {
        Self::Subscription {
            topics: topics.to_vec(),
            message: message.into(),
        }
    }

    pub fn consume(message: impl Into<String>) -> Self {
        Self::Consume {
            message: message.into(),
        }
    }
}

#[cfg(feature = "kafka")]
impl From<rdkafka::error::KafkaError> for MessagingError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        match err {
            rdkafka::error::KafkaError::ClientCreation(message) => {
                MessagingError::connection(message)
            }
            other => MessagingError::consume(other.to_string()),
        }
    }
}

pub type MessagingResult<T> = Result<T, MessagingError>;
