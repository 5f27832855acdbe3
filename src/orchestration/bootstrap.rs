//! # Notifier Bootstrap
//!
//! Wires the pipeline together once at startup: gateway → delivery service →
//! handler registry → dispatcher → consumer loop. The consumer runs on its own
//! task; the returned handle owns the cancellation token that stops it.

use crate::config::NotifierConfig;
use crate::error::{NotifierError, Result};
use crate::gateway::{self, PushGateway};
use crate::handlers::HandlerContext;
use crate::messaging::{ConsumerSummary, EventConsumer, MessageBroker, MessagingResult};
use crate::orchestration::MessageDispatcher;
use crate::registry::HandlerRegistry;
use crate::services::DeliveryService;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Lifecycle handle for a running pipeline
pub struct NotifierSystemHandle {
    shutdown: CancellationToken,
    dispatcher: Arc<MessageDispatcher>,
    consumer: JoinHandle<MessagingResult<ConsumerSummary>>,
}

impl NotifierSystemHandle {
    /// Request shutdown. The in-flight dispatch, if any, finishes first.
    pub fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            warn!("Notifier already shutting down");
            return;
        }
        info!("🛑 Notifier shutdown requested");
        self.shutdown.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled() && !self.consumer.is_finished()
    }

    /// Token that stops the consumer; clones can be handed to signal handlers
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn dispatcher(&self) -> Arc<MessageDispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Wait for the consumer loop to exit
    pub async fn join(self) -> Result<ConsumerSummary> {
        let summary = self
            .consumer
            .await
            .map_err(|e| NotifierError::internal(format!("Consumer task failed: {e}")))??;
        info!(
            received = summary.received,
            consume_errors = summary.consume_errors,
            "✅ Notifier stopped"
        );
        Ok(summary)
    }
}

pub struct NotifierSystem;

impl NotifierSystem {
    /// Build the configured gateway and start consuming from `broker`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bootstrap<B>(config: &NotifierConfig, broker: B) -> Result<NotifierSystemHandle>
    where
        B: MessageBroker + 'static,
    {
        config.validate()?;
        let gateway = gateway::from_config(&config.push)?;
        Self::bootstrap_with_gateway(config, broker, gateway)
    }

    /// Start the pipeline with an already-constructed gateway
    pub fn bootstrap_with_gateway<B>(
        config: &NotifierConfig,
        broker: B,
        gateway: Arc<dyn PushGateway>,
    ) -> Result<NotifierSystemHandle>
    where
        B: MessageBroker + 'static,
    {
        info!(gateway = gateway.name(), "🚀 BOOTSTRAP: Starting notifier pipeline");

        let delivery = Arc::new(DeliveryService::with_config(gateway, &config.delivery));
        let registry = HandlerRegistry::from_bindings(&config.topics, &HandlerContext::new(delivery))?;
        let topics = registry.topics().to_vec();
        let dispatcher = Arc::new(MessageDispatcher::new(Arc::new(registry)));

        let consumer = EventConsumer::new(
            broker,
            Arc::clone(&dispatcher),
            topics.clone(),
            config.consumer.clone(),
        );

        let shutdown = CancellationToken::new();
        let consumer = tokio::spawn(consumer.run(shutdown.clone()));

        info!(
            topics = %topics.join(", "),
            "✅ BOOTSTRAP: Consumer loop started"
        );

        Ok(NotifierSystemHandle {
            shutdown,
            dispatcher,
            consumer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PushProvider;
    use crate::gateway::LogGateway;
    use crate::messaging::InMemoryBroker;

    #[tokio::test]
    async fn test_bootstrap_and_shutdown() {
        let (broker, handle) = InMemoryBroker::new();
        let system = NotifierSystem::bootstrap(&NotifierConfig::default(), broker).unwrap();
        assert!(system.is_running());

        handle.publish("test.topic", b"ping".to_vec()).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        system.shutdown();
        let summary = system.join().await.unwrap();
        assert_eq!(summary.received, 1);
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn test_bootstrap_rejects_invalid_config() {
        let mut config = NotifierConfig::default();
        config.push.provider = PushProvider::Fcm;
        let (broker, _handle) = InMemoryBroker::new();

        assert!(matches!(
            NotifierSystem::bootstrap(&config, broker),
            Err(NotifierError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_bindings_fail_bootstrap() {
        let mut config = NotifierConfig::default();
        let first = config.topics.0[0].clone();
        config.topics.0.push(first);
        let (broker, _handle) = InMemoryBroker::new();

        let result =
            NotifierSystem::bootstrap_with_gateway(&config, broker, Arc::new(LogGateway::new()));
        assert!(result.is_err());
    }
}
