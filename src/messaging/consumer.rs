//! # Event Consumer Loop
//!
//! Polls the broker and hands each message to the dispatcher, one at a time.
//! A message is fully dispatched before the next poll, which keeps dispatch in
//! partition order. Every message is dispatched, empty payloads included;
//! handlers decide what an empty body means. Only the shutdown token ends the
//! loop; consume errors are logged and polling resumes after a short backoff.

use super::errors::MessagingResult;
use super::message::{MessageBroker, PollResult};
use crate::config::ConsumerConfig;
use crate::orchestration::MessageDispatcher;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

const PAYLOAD_PREVIEW_LEN: usize = 256;

/// Counters reported when the loop exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerSummary {
    pub received: u64,
    pub partition_eofs: u64,
    pub consume_errors: u64,
}

pub struct EventConsumer<B: MessageBroker> {
    broker: B,
    dispatcher: Arc<MessageDispatcher>,
    topics: Vec<String>,
    config: ConsumerConfig,
}

impl<B: MessageBroker> EventConsumer<B> {
    pub fn new(
        broker: B,
        dispatcher: Arc<MessageDispatcher>,
        topics: Vec<String>,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            broker,
            dispatcher,
            topics,
            config,
        }
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// Fails only when the initial subscription fails. An in-flight dispatch
    /// is never interrupted; cancellation is observed between messages.
    #[instrument(skip_all)]
    pub async fn run(mut self, shutdown: CancellationToken) -> MessagingResult<ConsumerSummary> {
        self.broker.subscribe(&self.topics).await?;
        info!(topics = %self.topics.join(", "), "Subscribed to topics");

        let mut summary = ConsumerSummary::default();

        loop {
            let polled = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                polled = self.broker.poll() => polled,
            };

            match polled {
                Ok(PollResult::PartitionEof { partition }) => {
                    summary.partition_eofs += 1;
                    debug!(partition = partition, "Reached end of partition");
                }
                Ok(PollResult::Message(message)) => {
                    summary.received += 1;
                    info!(
                        topic = %message.topic,
                        partition = message.partition,
                        offset = message.offset,
                        payload = %message.payload_preview(PAYLOAD_PREVIEW_LEN),
                        "Received message"
                    );

                    self.dispatcher
                        .dispatch(&message.topic, &message.payload)
                        .await;
                }
                Err(e) => {
                    summary.consume_errors += 1;
                    error!(error = %e, "Error consuming message from broker");

                    let backoff = self.config.error_backoff();
                    if !backoff.is_zero() {
                        tokio::select! {
                            biased;
                            _ = shutdown.cancelled() => break,
                            _ = tokio::time::sleep(backoff) => {}
                        }
                    }
                }
            }
        }

        if let Err(e) = self.broker.close().await {
            warn!(error = %e, "Failed to close broker subscription cleanly");
        }

        info!(
            received = summary.received,
            partition_eofs = summary.partition_eofs,
            consume_errors = summary.consume_errors,
            "Consumer stopping"
        );

        Ok(summary)
    }
}
