use super::{deliver_to_tokens, HandleOutcome, HandlerError, HandlerResult, MessageHandler};
use crate::constants::{data_keys, event_types};
use crate::models::{AudioAnalysisCompletedEvent, DomainEvent, Notification};
use crate::services::DeliveryService;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

pub const TITLE: &str = "Audio Analysis Complete";

/// Notifies the uploader's devices that their audio finished processing
pub struct AudioAnalysisCompletedHandler {
    delivery: Arc<DeliveryService>,
}

impl AudioAnalysisCompletedHandler {
    pub fn new(delivery: Arc<DeliveryService>) -> Self {
        Self { delivery }
    }

    fn body(subject: &str, event: &AudioAnalysisCompletedEvent) -> String {
        if event.is_success() {
            format!("Your audio '{subject}' has been transcribed.")
        } else {
            format!(
                "Processing of '{subject}' finished with status: {}",
                event.status()
            )
        }
    }
}

#[async_trait]
impl MessageHandler for AudioAnalysisCompletedHandler {
    fn name(&self) -> &'static str {
        "audio_analysis_completed"
    }

    async fn handle(&self, payload: &[u8]) -> HandlerResult<HandleOutcome> {
        let event = AudioAnalysisCompletedEvent::decode(payload)
            .map_err(|e| HandlerError::decode(AudioAnalysisCompletedEvent::EVENT_NAME, e))?;

        // validate() guarantees a subject
        let subject = event.subject().unwrap_or_default().to_string();
        info!(
            subject = %subject,
            status = %event.status(),
            completed_at = ?event.completed_at(),
            token_count = event.device_tokens.len(),
            "Processing audio analysis completion"
        );

        if event.device_tokens.is_empty() {
            warn!(subject = %subject, "No device tokens for audio analysis notification");
            return Ok(HandleOutcome::NoDevices);
        }

        let mut notification = Notification::new(TITLE, Self::body(&subject, &event))
            .with_data(data_keys::EVENT_TYPE, event_types::AUDIO_ANALYSIS_COMPLETED)
            .with_data(data_keys::FILE_NAME, subject.as_str())
            .with_data(data_keys::STATUS, event.status());
        if let Some(audio_id) = event.audio_id.as_deref() {
            notification = notification.with_data(data_keys::AUDIO_ID, audio_id);
        }

        deliver_to_tokens(&self.delivery, event.device_tokens, notification).await
    }
}
