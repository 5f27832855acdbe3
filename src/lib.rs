#![allow(clippy::doc_markdown)] // Allow technical terms like Kafka, FCM in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Notifier Core
//!
//! Event-driven push notification dispatcher.
//!
//! ## Overview
//!
//! Domain events arrive on broker topics (`user.registered`,
//! `user.deregistered`, `audio.analyze.completed`, plus a diagnostic topic).
//! Each message is routed by topic to a handler, which decodes the payload and
//! asks the delivery service to push a notification to the user's devices.
//!
//! ## Architecture
//!
//! ```text
//! Consumer Loop → Dispatcher → Handler → Delivery Service → Push Gateway
//! ```
//!
//! Data only flows downstream. The consumer loop is strictly sequential; the
//! only concurrency is the bounded per-token fallback inside multicast
//! delivery.
//!
//! ## Module Organization
//!
//! - [`messaging`] - Broker abstraction, in-memory and Kafka brokers, consumer loop
//! - [`orchestration`] - Message dispatcher and system bootstrap
//! - [`registry`] - Topic → handler lookup table
//! - [`handlers`] - One handler per topic
//! - [`services`] - Delivery service with multicast fallback
//! - [`gateway`] - Push gateway capability (FCM with OAuth tokens, dry-run log)
//! - [`models`] - Decoded events and notification types
//! - [`config`] - Layered configuration
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use notifier_core::config::NotifierConfig;
//! use notifier_core::messaging::InMemoryBroker;
//! use notifier_core::orchestration::NotifierSystem;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (broker, producer) = InMemoryBroker::new();
//! let system = NotifierSystem::bootstrap(&NotifierConfig::default(), broker)?;
//!
//! producer.publish("test.topic", b"ping".to_vec())?;
//!
//! system.shutdown();
//! let summary = system.join().await?;
//! println!("received {} messages", summary.received);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod orchestration;
pub mod registry;
pub mod services;

pub use config::{ConfigManager, ConfigurationError, NotifierConfig};
pub use error::{NotifierError, Result};
pub use gateway::{GatewayError, PushGateway};
pub use handlers::{HandlerKind, MessageHandler};
pub use messaging::{ConsumerSummary, EventConsumer, InMemoryBroker, MessageBroker, RawMessage};
pub use models::{DeliveryOutcome, Notification, NotificationRequest};
pub use orchestration::{DispatchOutcome, MessageDispatcher, NotifierSystem, NotifierSystemHandle};
pub use registry::HandlerRegistry;
pub use services::{DeliveryError, DeliveryService};
