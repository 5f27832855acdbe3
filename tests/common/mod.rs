#![allow(dead_code)]

pub mod mock_gateway;

pub use mock_gateway::*;

use notifier_core::config::{ConsumerConfig, TopicBindings};
use notifier_core::handlers::HandlerContext;
use notifier_core::messaging::{
    ConsumerSummary, EventConsumer, InMemoryBroker, InMemoryBrokerHandle, MessagingResult,
};
use notifier_core::orchestration::MessageDispatcher;
use notifier_core::registry::HandlerRegistry;
use notifier_core::services::DeliveryService;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A consumer loop running on the in-memory broker
pub struct TestPipeline {
    pub producer: InMemoryBrokerHandle,
    pub dispatcher: Arc<MessageDispatcher>,
    pub shutdown: CancellationToken,
    pub consumer: JoinHandle<MessagingResult<ConsumerSummary>>,
}

impl TestPipeline {
    /// Start the default topic bindings against `gateway`
    pub fn start(gateway: Arc<RecordingGateway>) -> Self {
        let delivery = Arc::new(DeliveryService::new(gateway));
        let registry =
            HandlerRegistry::from_bindings(&TopicBindings::default(), &HandlerContext::new(delivery))
                .expect("default bindings build");
        let topics = registry.topics().to_vec();
        let dispatcher = Arc::new(MessageDispatcher::new(Arc::new(registry)));

        let (broker, producer) = InMemoryBroker::new();
        let consumer = EventConsumer::new(
            broker,
            Arc::clone(&dispatcher),
            topics,
            ConsumerConfig { error_backoff_ms: 0 },
        );
        let shutdown = CancellationToken::new();
        let consumer = tokio::spawn(consumer.run(shutdown.clone()));

        Self {
            producer,
            dispatcher,
            shutdown,
            consumer,
        }
    }

    /// Wait until `count` dispatches have completed across all topics
    pub async fn wait_for_dispatches(&self, count: u64) {
        let dispatcher = Arc::clone(&self.dispatcher);
        wait_until(move || {
            dispatcher
                .stats()
                .iter()
                .map(|(_, stats)| stats.total())
                .sum::<u64>()
                >= count
        })
        .await;
    }

    pub async fn stop(self) -> ConsumerSummary {
        self.shutdown.cancel();
        self.consumer
            .await
            .expect("consumer task joins")
            .expect("consumer exits cleanly")
    }
}

/// Poll `condition` until it holds, failing the test after two seconds
pub async fn wait_until<F>(condition: F)
where
    F: Fn() -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met within timeout");
}
