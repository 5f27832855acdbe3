//! End-to-end dispatch through the consumer loop on the in-memory broker.

mod common;

use async_trait::async_trait;
use common::{wait_until, GatewayCall, RecordingGateway, TestPipeline};
use notifier_core::config::{ConsumerConfig, NotifierConfig};
use notifier_core::handlers::{
    HandleOutcome, HandlerContext, HandlerFactory, HandlerKind, HandlerResult, MessageHandler,
};
use notifier_core::messaging::{EventConsumer, InMemoryBroker};
use notifier_core::orchestration::{DispatchOutcome, MessageDispatcher, NotifierSystem};
use notifier_core::registry::HandlerRegistry;
use notifier_core::services::DeliveryService;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn payload(value: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap()
}

#[tokio::test]
async fn test_audio_completion_with_failing_batch_falls_back_per_token() {
    let gateway = Arc::new(RecordingGateway::failing_batch());
    let pipeline = TestPipeline::start(gateway.clone());

    pipeline
        .producer
        .publish(
            "audio.analyze.completed",
            payload(json!({
                "fileName": "interview.mp3",
                "status": "success",
                "deviceTokens": ["tok-a", "tok-b", "tok-c"],
            })),
        )
        .unwrap();

    pipeline.wait_for_dispatches(1).await;
    assert_eq!(gateway.multicast_calls(), 1);
    assert_eq!(gateway.single_sends(), 3);
    assert!(gateway.max_in_flight() <= 3);

    let stats = pipeline.dispatcher.topic_stats("audio.analyze.completed");
    assert_eq!(stats.handled, 1);

    let summary = pipeline.stop().await;
    assert_eq!(summary.received, 1);
}

#[tokio::test]
async fn test_deregistration_without_devices_sends_nothing() {
    let gateway = Arc::new(RecordingGateway::new());
    let pipeline = TestPipeline::start(gateway.clone());

    pipeline
        .producer
        .publish(
            "user.deregistered",
            payload(json!({"userId": "user-9", "deviceTokens": []})),
        )
        .unwrap();

    pipeline.wait_for_dispatches(1).await;
    assert!(gateway.calls().is_empty());
    assert_eq!(pipeline.dispatcher.topic_stats("user.deregistered").handled, 1);
    pipeline.stop().await;
}

#[tokio::test]
async fn test_registration_sends_welcome_to_single_device() {
    let gateway = Arc::new(RecordingGateway::new());
    let pipeline = TestPipeline::start(gateway.clone());

    pipeline
        .producer
        .publish(
            "user.registered",
            payload(json!({
                "UserId": "user-1",
                "DeviceToken": "device-token-1",
                "Platform": "android",
                "RegisteredAt": "2024-05-01T12:00:00Z",
            })),
        )
        .unwrap();

    pipeline.wait_for_dispatches(1).await;
    match gateway.calls().as_slice() {
        [GatewayCall::Single {
            token,
            notification,
        }] => {
            assert_eq!(token, "device-token-1");
            assert_eq!(notification.title, "Welcome");
            assert_eq!(
                notification.body,
                "Your account has been registered successfully"
            );
        }
        other => panic!("unexpected gateway calls: {other:?}"),
    }
    pipeline.stop().await;
}

#[tokio::test]
async fn test_loop_survives_bad_messages_eofs_and_errors() {
    let gateway = Arc::new(RecordingGateway::new());
    let pipeline = TestPipeline::start(gateway.clone());
    let producer = &pipeline.producer;

    producer.publish("unknown.topic", b"{}".to_vec()).unwrap();
    producer.publish("user.registered", b"{not json".to_vec()).unwrap();
    producer.publish_partition_eof(0).unwrap();
    producer.inject_error("broker transport failure").unwrap();
    producer.publish("user.registered", Vec::new()).unwrap();
    producer
        .publish(
            "user.deregistered",
            payload(json!({"userId": "u", "deviceTokens": ["a", "b"]})),
        )
        .unwrap();
    producer.publish("test.topic", b"ping".to_vec()).unwrap();

    // unknown.topic is filtered by the broker; the empty payload is dispatched
    // and dropped by the handler like any other undecodable body
    pipeline.wait_for_dispatches(4).await;

    assert_eq!(pipeline.dispatcher.topic_stats("user.registered").dropped, 2);
    assert_eq!(pipeline.dispatcher.topic_stats("user.deregistered").handled, 1);
    assert_eq!(pipeline.dispatcher.topic_stats("test.topic").handled, 1);
    assert_eq!(pipeline.dispatcher.topic_stats("unknown.topic").total(), 0);
    assert_eq!(gateway.multicast_calls(), 1);

    let summary = pipeline.stop().await;
    assert_eq!(summary.partition_eofs, 1);
    assert_eq!(summary.consume_errors, 1);
    assert_eq!(summary.received, 4);
}

#[tokio::test]
async fn test_empty_diagnostic_payload_is_dispatched() {
    let gateway = Arc::new(RecordingGateway::new());
    let pipeline = TestPipeline::start(gateway.clone());

    pipeline.producer.publish("test.topic", Vec::new()).unwrap();
    pipeline.producer.publish("test.topic", b"x".to_vec()).unwrap();

    pipeline.wait_for_dispatches(2).await;
    let stats = pipeline.dispatcher.topic_stats("test.topic");
    assert_eq!(stats.total(), 2);
    assert_eq!(stats.handled, 2);
    assert!(gateway.calls().is_empty());

    let summary = pipeline.stop().await;
    assert_eq!(summary.received, 2);
}

#[tokio::test]
async fn test_unroutable_topic_dispatch_is_noop() {
    let gateway = Arc::new(RecordingGateway::new());
    let pipeline = TestPipeline::start(gateway.clone());

    let outcome = pipeline.dispatcher.dispatch("unknown.topic", b"{}").await;
    assert_eq!(outcome, DispatchOutcome::NoHandler);
    assert!(gateway.calls().is_empty());
    pipeline.stop().await;
}

#[tokio::test]
async fn test_cancellation_closes_broker() {
    let gateway = Arc::new(RecordingGateway::new());
    let pipeline = TestPipeline::start(gateway);
    let producer = pipeline.producer.clone();

    wait_until(|| !producer.subscriptions().is_empty()).await;
    assert_eq!(producer.subscriptions().len(), 4);

    let summary = pipeline.stop().await;
    assert_eq!(summary.received, 0);
    assert!(producer.is_closed());
    assert!(producer.subscriptions().is_empty());
}

#[tokio::test]
async fn test_successful_batch_does_not_fall_back() {
    let gateway = Arc::new(RecordingGateway::new().with_failing_tokens(["stale"]));
    let pipeline = TestPipeline::start(gateway.clone());

    pipeline
        .producer
        .publish(
            "audio.analyze.completed",
            payload(json!({
                "audioId": 42,
                "status": "failed",
                "deviceTokens": ["fresh", "stale"],
            })),
        )
        .unwrap();

    pipeline.wait_for_dispatches(1).await;
    assert_eq!(gateway.multicast_calls(), 1);
    assert_eq!(gateway.single_sends(), 0);
    pipeline.stop().await;
}

#[tokio::test]
async fn test_direct_dispatch_reports_handle_outcome() {
    let gateway = Arc::new(RecordingGateway::new());
    let pipeline = TestPipeline::start(gateway);

    let outcome = pipeline
        .dispatcher
        .dispatch("user.deregistered", br#"{"userId": "u", "deviceTokens": []}"#)
        .await;
    assert_eq!(outcome, DispatchOutcome::Handled(HandleOutcome::NoDevices));
    pipeline.stop().await;
}

#[tokio::test]
async fn test_system_bootstrap_with_recording_gateway() {
    let gateway = Arc::new(RecordingGateway::new());
    let (broker, producer) = InMemoryBroker::new();
    let system =
        NotifierSystem::bootstrap_with_gateway(&NotifierConfig::default(), broker, gateway.clone())
            .unwrap();

    producer
        .publish(
            "user.registered",
            payload(json!({"userId": 5, "deviceTokens": ["x", "y"]})),
        )
        .unwrap();

    let dispatcher = system.dispatcher();
    wait_until(|| dispatcher.topic_stats("user.registered").handled == 1).await;
    assert_eq!(gateway.multicast_calls(), 1);

    system.shutdown();
    assert!(!system.is_running());
    let summary = system.join().await.unwrap();
    assert_eq!(summary.received, 1);
}

struct ExplodingHandler;

#[async_trait]
impl MessageHandler for ExplodingHandler {
    fn name(&self) -> &'static str {
        "exploding"
    }

    async fn handle(&self, payload: &[u8]) -> HandlerResult<HandleOutcome> {
        let text = std::str::from_utf8(payload).unwrap();
        panic!("unexpected payload shape: {text}");
    }
}

#[tokio::test]
async fn test_loop_keeps_polling_after_handler_panic() {
    let delivery = Arc::new(DeliveryService::new(Arc::new(RecordingGateway::new())));
    let exploding: HandlerFactory =
        Arc::new(|_: &HandlerContext| Arc::new(ExplodingHandler) as Arc<dyn MessageHandler>);
    let registry = HandlerRegistry::builder()
        .register("audio.analyze.completed", exploding)
        .register("test.topic", HandlerKind::Diagnostic.factory())
        .build(&HandlerContext::new(delivery))
        .unwrap();
    let topics = registry.topics().to_vec();
    let dispatcher = Arc::new(MessageDispatcher::new(Arc::new(registry)));

    let (broker, producer) = InMemoryBroker::new();
    let shutdown = CancellationToken::new();
    let consumer = tokio::spawn(
        EventConsumer::new(
            broker,
            Arc::clone(&dispatcher),
            topics,
            ConsumerConfig::default(),
        )
        .run(shutdown.clone()),
    );

    producer.publish("audio.analyze.completed", b"{}".to_vec()).unwrap();
    producer.publish("test.topic", b"after".to_vec()).unwrap();

    wait_until(|| dispatcher.topic_stats("test.topic").handled == 1).await;
    assert_eq!(dispatcher.topic_stats("audio.analyze.completed").panicked, 1);

    shutdown.cancel();
    let summary = consumer.await.unwrap().unwrap();
    assert_eq!(summary.received, 2);
}
