use super::{deliver_to_tokens, HandleOutcome, HandlerError, HandlerResult, MessageHandler};
use crate::constants::{data_keys, event_types};
use crate::models::{DomainEvent, Notification, UserRegisteredEvent};
use crate::services::DeliveryService;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

pub const TITLE: &str = "Welcome";
pub const BODY: &str = "Your account has been registered successfully";

/// Sends the welcome notification to a newly registered device
pub struct UserRegisteredHandler {
    delivery: Arc<DeliveryService>,
}

impl UserRegisteredHandler {
    pub fn new(delivery: Arc<DeliveryService>) -> Self {
        Self { delivery }
    }

    fn notification(event: &UserRegisteredEvent) -> Notification {
        Notification::new(TITLE, BODY)
            .with_data(data_keys::EVENT_TYPE, event_types::USER_REGISTERED)
            .with_data(data_keys::USER_ID, event.user_id.as_str())
    }
}

#[async_trait]
impl MessageHandler for UserRegisteredHandler {
    fn name(&self) -> &'static str {
        "user_registered"
    }

    async fn handle(&self, payload: &[u8]) -> HandlerResult<HandleOutcome> {
        let event = UserRegisteredEvent::decode(payload)
            .map_err(|e| HandlerError::decode(UserRegisteredEvent::EVENT_NAME, e))?;

        let platform = event.platform().map(|p| p.to_string()).unwrap_or_default();
        info!(
            user_id = %event.user_id,
            platform = %platform,
            "Processing user registration"
        );

        let tokens = event.tokens();
        if tokens.is_empty() {
            warn!(user_id = %event.user_id, "Registration carried no device token");
            return Ok(HandleOutcome::NoDevices);
        }

        deliver_to_tokens(&self.delivery, tokens, Self::notification(&event)).await
    }
}
