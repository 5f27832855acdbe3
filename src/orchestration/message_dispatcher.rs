//! # Message Dispatcher
//!
//! Resolves a topic to its handler and runs it behind an isolation boundary.
//! Nothing a handler does (decode error, delivery error, panic) reaches the
//! consumer loop; each dispatch ends in exactly one log entry describing its
//! outcome.

use crate::handlers::{HandleOutcome, HandlerError};
use crate::registry::HandlerRegistry;
use dashmap::DashMap;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, warn};

/// How a single dispatch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled(HandleOutcome),
    /// No handler registered for the topic
    NoHandler,
    /// Payload could not be decoded; message dropped
    Dropped,
    /// Handler returned an error
    Failed,
    /// Handler panicked
    Panicked,
}

/// Per-topic dispatch counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopicStats {
    pub handled: u64,
    pub no_handler: u64,
    pub dropped: u64,
    pub failed: u64,
    pub panicked: u64,
}

impl TopicStats {
    pub fn total(&self) -> u64 {
        self.handled + self.no_handler + self.dropped + self.failed + self.panicked
    }

    fn record(&mut self, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Handled(_) => self.handled += 1,
            DispatchOutcome::NoHandler => self.no_handler += 1,
            DispatchOutcome::Dropped => self.dropped += 1,
            DispatchOutcome::Failed => self.failed += 1,
            DispatchOutcome::Panicked => self.panicked += 1,
        }
    }
}

pub struct MessageDispatcher {
    registry: Arc<HandlerRegistry>,
    stats: DashMap<String, TopicStats>,
}

impl std::fmt::Debug for MessageDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageDispatcher")
            .field("registry", &self.registry)
            .field("tracked_topics", &self.stats.len())
            .finish()
    }
}

impl MessageDispatcher {
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self {
            registry,
            stats: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Dispatch one message. Never fails and never panics outward.
    pub async fn dispatch(&self, topic: &str, payload: &[u8]) -> DispatchOutcome {
        let outcome = match self.registry.resolve(topic) {
            None => {
                warn!(topic = %topic, "No handler registered for topic, message ignored");
                DispatchOutcome::NoHandler
            }
            Some(handler) => {
                let result = AssertUnwindSafe(handler.handle(payload))
                    .catch_unwind()
                    .await;

                match result {
                    Ok(Ok(handled)) => {
                        info!(
                            topic = %topic,
                            handler = handler.name(),
                            outcome = ?handled,
                            "Message handled"
                        );
                        DispatchOutcome::Handled(handled)
                    }
                    Ok(Err(HandlerError::Decode { event, source })) => {
                        warn!(
                            topic = %topic,
                            handler = handler.name(),
                            event = event,
                            error = %source,
                            "Dropping message that failed to decode"
                        );
                        DispatchOutcome::Dropped
                    }
                    Ok(Err(e)) => {
                        error!(
                            topic = %topic,
                            handler = handler.name(),
                            error = %e,
                            "Handler failed"
                        );
                        DispatchOutcome::Failed
                    }
                    Err(panic) => {
                        error!(
                            topic = %topic,
                            handler = handler.name(),
                            panic = %panic_message(panic.as_ref()),
                            "Handler panicked"
                        );
                        DispatchOutcome::Panicked
                    }
                }
            }
        };

        self.stats
            .entry(topic.to_string())
            .or_default()
            .record(&outcome);
        outcome
    }

    /// Snapshot of per-topic counters
    pub fn stats(&self) -> Vec<(String, TopicStats)> {
        let mut snapshot: Vec<(String, TopicStats)> = self
            .stats
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));
        snapshot
    }

    pub fn topic_stats(&self, topic: &str) -> TopicStats {
        self.stats.get(topic).map(|s| *s).unwrap_or_default()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
