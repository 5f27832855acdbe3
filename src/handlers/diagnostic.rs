use super::{HandleOutcome, HandlerResult, MessageHandler};
use async_trait::async_trait;
use tracing::info;

const PREVIEW_LEN: usize = 128;

/// Logs receipt only. Used to verify the pipeline end to end.
#[derive(Debug, Default)]
pub struct DiagnosticHandler;

impl DiagnosticHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MessageHandler for DiagnosticHandler {
    fn name(&self) -> &'static str {
        "diagnostic"
    }

    async fn handle(&self, payload: &[u8]) -> HandlerResult<HandleOutcome> {
        let text = String::from_utf8_lossy(payload);
        let preview: String = text.chars().take(PREVIEW_LEN).collect();
        info!(bytes = payload.len(), payload = %preview, "Diagnostic message received");
        Ok(HandleOutcome::Logged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_accepts_anything() {
        let handler = DiagnosticHandler::new();
        assert_eq!(handler.handle(b"ping").await.unwrap(), HandleOutcome::Logged);
        assert_eq!(
            handler.handle(&[0xff, 0xfe]).await.unwrap(),
            HandleOutcome::Logged
        );
    }
}
