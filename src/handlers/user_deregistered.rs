use super::{HandleOutcome, HandlerError, HandlerResult, MessageHandler};
use crate::constants::{data_keys, event_types};
use crate::models::{DomainEvent, Notification, NotificationRequest, UserDeregisteredEvent};
use crate::services::DeliveryService;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub const TITLE: &str = "Account Deregistered";
pub const BODY: &str = "Your account has been deregistered";

/// Tells every remaining device that the account is gone
pub struct UserDeregisteredHandler {
    delivery: Arc<DeliveryService>,
}

impl UserDeregisteredHandler {
    pub fn new(delivery: Arc<DeliveryService>) -> Self {
        Self { delivery }
    }
}

#[async_trait]
impl MessageHandler for UserDeregisteredHandler {
    fn name(&self) -> &'static str {
        "user_deregistered"
    }

    async fn handle(&self, payload: &[u8]) -> HandlerResult<HandleOutcome> {
        let event = UserDeregisteredEvent::decode(payload)
            .map_err(|e| HandlerError::decode(UserDeregisteredEvent::EVENT_NAME, e))?;

        if event.device_tokens.is_empty() {
            info!(user_id = %event.user_id, "User has no active devices, nothing to notify");
            return Ok(HandleOutcome::NoDevices);
        }

        info!(
            user_id = %event.user_id,
            token_count = event.device_tokens.len(),
            "Notifying devices of deregistration"
        );

        let notification = Notification::new(TITLE, BODY)
            .with_data(data_keys::EVENT_TYPE, event_types::USER_DEREGISTERED)
            .with_data(data_keys::USER_ID, event.user_id.as_str());

        let outcome = self
            .delivery
            .send_multicast(NotificationRequest::new(event.device_tokens, notification))
            .await;
        Ok(HandleOutcome::Delivered(outcome))
    }
}
