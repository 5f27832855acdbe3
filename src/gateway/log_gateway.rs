use super::{BatchResponse, GatewayResult, PushGateway};
use crate::logging::redact_token;
use crate::models::Notification;
use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

/// Dry-run gateway: logs every notification and reports it as delivered
#[derive(Debug, Default, Clone)]
pub struct LogGateway;

impl LogGateway {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PushGateway for LogGateway {
    async fn send(&self, token: &str, notification: &Notification) -> GatewayResult<String> {
        let message_id = format!("log-{}", Uuid::new_v4());
        info!(
            token = %redact_token(token),
            title = %notification.title,
            body = %notification.body,
            data = ?notification.data,
            message_id = %message_id,
            "Push notification (dry run)"
        );
        Ok(message_id)
    }

    async fn send_multicast(
        &self,
        tokens: &[String],
        notification: &Notification,
    ) -> GatewayResult<BatchResponse> {
        info!(
            token_count = tokens.len(),
            title = %notification.title,
            body = %notification.body,
            data = ?notification.data,
            "Multicast push notification (dry run)"
        );
        Ok(BatchResponse {
            success_count: tokens.len(),
            failure_count: 0,
        })
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
