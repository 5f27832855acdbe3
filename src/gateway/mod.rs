//! # Push Gateway
//!
//! Capability interface for the external push service plus its
//! implementations. The gateway client is built once at startup and shared
//! read-only; calls are stateless.

pub mod errors;
pub mod fcm;
pub mod log_gateway;
pub mod oauth;
#[cfg(test)]
pub(crate) mod test_support;

use crate::config::{PushConfig, PushProvider};
use crate::models::Notification;
use async_trait::async_trait;
use std::sync::Arc;

pub use errors::{GatewayError, GatewayResult};
pub use fcm::FcmGateway;
pub use log_gateway::LogGateway;
pub use oauth::{AccessTokenSource, ServiceAccountKey, ServiceAccountTokenSource, StaticToken};

/// Per-token counts reported by a batched send
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchResponse {
    pub success_count: usize,
    pub failure_count: usize,
}

#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Deliver to one device token, returning the gateway message id
    async fn send(&self, token: &str, notification: &Notification) -> GatewayResult<String>;

    /// Deliver to many tokens in one call.
    ///
    /// `Err` means the batch call itself failed; per-token rejections are
    /// reported through [`BatchResponse::failure_count`].
    async fn send_multicast(
        &self,
        tokens: &[String],
        notification: &Notification,
    ) -> GatewayResult<BatchResponse>;

    fn name(&self) -> &'static str;
}

/// Construct the configured gateway
pub fn from_config(config: &PushConfig) -> GatewayResult<Arc<dyn PushGateway>> {
    match config.provider {
        PushProvider::Fcm => Ok(Arc::new(FcmGateway::from_config(config)?)),
        PushProvider::Log => Ok(Arc::new(LogGateway::new())),
    }
}
