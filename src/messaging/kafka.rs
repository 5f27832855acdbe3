//! # Kafka Broker
//!
//! [`MessageBroker`] backed by an rdkafka `StreamConsumer` in a consumer group
//! with auto-commit. Delivery is at-least-once: offsets are committed on the
//! auto-commit interval, independent of whether dispatch finished.

use super::errors::{MessagingError, MessagingResult};
use super::message::{MessageBroker, PollResult, RawMessage};
use crate::config::KafkaConfig;
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use tracing::info;

pub struct KafkaBroker {
    consumer: StreamConsumer,
    group_id: String,
}

impl KafkaBroker {
    pub fn from_config(config: &KafkaConfig) -> MessagingResult<Self> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", config.enable_auto_commit.to_string())
            .set("auto.offset.reset", &config.auto_offset_reset)
            .set("session.timeout.ms", config.session_timeout_ms.to_string())
            .set(
                "enable.partition.eof",
                config.enable_partition_eof.to_string(),
            );

        let consumer: StreamConsumer = client_config
            .create()
            .map_err(|e| MessagingError::connection(e.to_string()))?;

        info!(
            brokers = %config.brokers,
            group_id = %config.group_id,
            "Kafka consumer created"
        );

        Ok(Self {
            consumer,
            group_id: config.group_id.clone(),
        })
    }
}

#[async_trait]
impl MessageBroker for KafkaBroker {
    async fn subscribe(&mut self, topics: &[String]) -> MessagingResult<()> {
        let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
        self.consumer
            .subscribe(&topic_refs)
            .map_err(|e| MessagingError::subscription(topics, e.to_string()))
    }

    async fn poll(&mut self) -> MessagingResult<PollResult> {
        match self.consumer.recv().await {
            Ok(message) => Ok(PollResult::Message(RawMessage::new(
                message.topic(),
                message.partition(),
                message.offset(),
                message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            ))),
            Err(KafkaError::PartitionEOF(partition)) => Ok(PollResult::PartitionEof { partition }),
            Err(e) => Err(e.into()),
        }
    }

    async fn close(&mut self) -> MessagingResult<()> {
        self.consumer.unsubscribe();
        info!(group_id = %self.group_id, "Kafka subscription closed");
        Ok(())
    }
}
