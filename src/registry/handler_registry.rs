//! # Handler Registry
//!
//! Immutable topic → handler lookup, built once at startup.
//!
//! ```rust
//! use notifier_core::gateway::LogGateway;
//! use notifier_core::handlers::{HandlerContext, HandlerKind};
//! use notifier_core::registry::HandlerRegistry;
//! use notifier_core::services::DeliveryService;
//! use std::sync::Arc;
//!
//! let delivery = Arc::new(DeliveryService::new(Arc::new(LogGateway::new())));
//! let registry = HandlerRegistry::builder()
//!     .register("test.topic", HandlerKind::Diagnostic.factory())
//!     .build(&HandlerContext::new(delivery))
//!     .unwrap();
//!
//! assert!(registry.resolve("test.topic").is_some());
//! assert!(registry.resolve("unknown.topic").is_none());
//! ```

use crate::config::{ConfigResult, ConfigurationError, TopicBindings};
use crate::handlers::{HandlerContext, HandlerFactory, MessageHandler};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Collects topic registrations; duplicates are reported at [`build`](Self::build)
#[derive(Default)]
pub struct HandlerRegistryBuilder {
    entries: Vec<(String, HandlerFactory)>,
}

impl HandlerRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, topic: impl Into<String>, factory: HandlerFactory) -> Self {
        self.entries.push((topic.into(), factory));
        self
    }

    /// Instantiate every handler and freeze the table
    pub fn build(self, ctx: &HandlerContext) -> ConfigResult<HandlerRegistry> {
        let mut handlers: HashMap<String, Arc<dyn MessageHandler>> =
            HashMap::with_capacity(self.entries.len());
        let mut topics = Vec::with_capacity(self.entries.len());

        for (topic, factory) in self.entries {
            let topic = topic.trim().to_string();
            if topic.is_empty() {
                return Err(ConfigurationError::invalid_value(
                    "topics",
                    "topic name must not be empty",
                ));
            }
            if handlers.contains_key(&topic) {
                return Err(ConfigurationError::duplicate_topic(topic));
            }

            let handler = factory(ctx);
            debug!(topic = %topic, handler = handler.name(), "Registered handler");
            handlers.insert(topic.clone(), handler);
            topics.push(topic);
        }

        info!(handler_count = handlers.len(), "Handler registry built");
        Ok(HandlerRegistry { handlers, topics })
    }
}

/// Read-only after construction; shared behind an `Arc`
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn MessageHandler>>,
    topics: Vec<String>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("topics", &self.topics)
            .finish()
    }
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::new()
    }

    /// Build from the configured topic bindings
    pub fn from_bindings(bindings: &TopicBindings, ctx: &HandlerContext) -> ConfigResult<Self> {
        bindings
            .iter()
            .fold(Self::builder(), |builder, binding| {
                builder.register(binding.topic.as_str(), binding.handler.factory())
            })
            .build(ctx)
    }

    pub fn resolve(&self, topic: &str) -> Option<Arc<dyn MessageHandler>> {
        self.handlers.get(topic).cloned()
    }

    /// Registered topics in registration order
    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
