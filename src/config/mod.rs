//! # Notifier Configuration
//!
//! Layered configuration for the dispatcher: a base YAML file, an optional
//! per-environment override file, then `NOTIFIER__*` environment variables.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use notifier_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let brokers = &manager.config().kafka.brokers;
//! let topics = manager.config().topic_names();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::{self, topics};
use crate::handlers::HandlerKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring notifier-config.yaml
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// Broker connection and consumer-group settings
    pub kafka: KafkaConfig,

    /// Consumer loop behaviour
    pub consumer: ConsumerConfig,

    /// Topic to handler bindings; the subscription set is derived from it
    pub topics: TopicBindings,

    /// Multicast delivery settings
    pub delivery: DeliveryConfig,

    /// Push gateway provider and credentials
    pub push: PushConfig,

    /// Log output settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KafkaConfig {
    pub brokers: String,
    pub group_id: String,
    pub auto_offset_reset: String,
    pub enable_auto_commit: bool,
    pub session_timeout_ms: u64,
    pub enable_partition_eof: bool,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            group_id: "notification-service-group".to_string(),
            auto_offset_reset: "earliest".to_string(),
            enable_auto_commit: true,
            session_timeout_ms: 45_000,
            enable_partition_eof: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Pause after a transient consume error, in milliseconds
    pub error_backoff_ms: u64,
}

impl ConsumerConfig {
    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            error_backoff_ms: constants::DEFAULT_CONSUME_ERROR_BACKOFF_MS,
        }
    }
}

/// A single topic to handler binding
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TopicBinding {
    pub topic: String,
    pub handler: HandlerKind,
}

impl TopicBinding {
    pub fn new(topic: impl Into<String>, handler: HandlerKind) -> Self {
        Self {
            topic: topic.into(),
            handler,
        }
    }
}

/// Ordered list of bindings. Kept as a list so duplicate topics surface as a
/// registry build error instead of being collapsed by a map.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct TopicBindings(pub Vec<TopicBinding>);

impl Default for TopicBindings {
    fn default() -> Self {
        Self(vec![
            TopicBinding::new(topics::DIAGNOSTIC, HandlerKind::Diagnostic),
            TopicBinding::new(
                topics::AUDIO_ANALYSIS_COMPLETED,
                HandlerKind::AudioAnalysisCompleted,
            ),
            TopicBinding::new(topics::USER_REGISTERED, HandlerKind::UserRegistered),
            TopicBinding::new(topics::USER_DEREGISTERED, HandlerKind::UserDeregistered),
        ])
    }
}

impl TopicBindings {
    pub fn iter(&self) -> impl Iterator<Item = &TopicBinding> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Maximum in-flight per-token sends when a batch call fails
    pub fallback_concurrency: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            fallback_concurrency: constants::DEFAULT_FALLBACK_CONCURRENCY,
        }
    }
}

/// Which push gateway implementation to construct at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PushProvider {
    /// Firebase Cloud Messaging over HTTP
    Fcm,
    /// Log notifications instead of sending them
    Log,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PushConfig {
    pub provider: PushProvider,
    /// Falls back to the service account key's project id when unset
    pub project_id: Option<String>,
    /// Static bearer token; overrides service account credentials
    pub access_token: Option<String>,
    /// Service account key file used to mint access tokens
    pub credentials_path: Option<String>,
    pub endpoint: String,
    pub request_timeout_ms: u64,
}

impl PushConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Service account key file: `credentials_path`, else the
    /// `GOOGLE_APPLICATION_CREDENTIALS` environment variable
    pub fn credentials_file(&self) -> Option<PathBuf> {
        credentials_file_from(
            self.credentials_path.as_deref(),
            std::env::var(constants::CREDENTIALS_ENV_VAR).ok().as_deref(),
        )
    }
}

fn credentials_file_from(configured: Option<&str>, from_env: Option<&str>) -> Option<PathBuf> {
    let usable = |p: &str| {
        let p = p.trim();
        (!p.is_empty()).then(|| PathBuf::from(p))
    };
    configured.and_then(usable).or_else(|| from_env.and_then(usable))
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            provider: PushProvider::Log,
            project_id: None,
            access_token: None,
            credentials_path: None,
            endpoint: "https://fcm.googleapis.com".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for JSON log files; console only when unset
    pub directory: Option<String>,
    /// Emit console output as JSON
    pub json: bool,
}

impl NotifierConfig {
    /// Topics the consumer subscribes to, in binding order
    pub fn topic_names(&self) -> Vec<String> {
        self.topics.iter().map(|b| b.topic.clone()).collect()
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.kafka.brokers.trim().is_empty() {
            return Err(ConfigurationError::missing_field("kafka.brokers"));
        }
        if self.kafka.group_id.trim().is_empty() {
            return Err(ConfigurationError::missing_field("kafka.group_id"));
        }
        if self.delivery.fallback_concurrency == 0 {
            return Err(ConfigurationError::invalid_value(
                "delivery.fallback_concurrency",
                "must be at least 1",
            ));
        }
        if self.topics.is_empty() {
            return Err(ConfigurationError::invalid_value(
                "topics",
                "at least one topic binding is required",
            ));
        }
        if let Some(binding) = self.topics.iter().find(|b| b.topic.trim().is_empty()) {
            return Err(ConfigurationError::invalid_value(
                "topics",
                format!("empty topic name bound to {}", binding.handler),
            ));
        }
        if self.push.provider == PushProvider::Fcm {
            if !is_blank(&self.push.access_token) {
                // A bare token carries no project
                if is_blank(&self.push.project_id) {
                    return Err(ConfigurationError::missing_field("push.project_id"));
                }
            } else if self.push.credentials_file().is_none() {
                return Err(ConfigurationError::missing_field("push.credentials_path"));
            }
        }
        Ok(())
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}
