use async_trait::async_trait;
use notifier_core::gateway::{BatchResponse, GatewayError, GatewayResult, PushGateway};
use notifier_core::models::Notification;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// One recorded gateway call
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    Single {
        token: String,
        notification: Notification,
    },
    Multicast {
        tokens: Vec<String>,
        notification: Notification,
    },
}

/// Push gateway double that records calls and tracks peak concurrency
#[derive(Debug, Default)]
pub struct RecordingGateway {
    fail_batch: bool,
    failing_tokens: HashSet<String>,
    send_delay: Duration,
    calls: Mutex<Vec<GatewayCall>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every batched call fails at the transport level
    pub fn failing_batch() -> Self {
        Self {
            fail_batch: true,
            ..Self::default()
        }
    }

    pub fn with_failing_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing_tokens = tokens.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().clone()
    }

    pub fn single_sends(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, GatewayCall::Single { .. }))
            .count()
    }

    pub fn multicast_calls(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, GatewayCall::Multicast { .. }))
            .count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushGateway for RecordingGateway {
    async fn send(&self, token: &str, notification: &Notification) -> GatewayResult<String> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.send_delay.is_zero() {
            tokio::time::sleep(self.send_delay).await;
        }
        self.calls.lock().push(GatewayCall::Single {
            token: token.to_string(),
            notification: notification.clone(),
        });
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_tokens.contains(token) {
            return Err(GatewayError::from_status(404, "Requested entity was not found."));
        }
        Ok(format!("projects/test/messages/{token}"))
    }

    async fn send_multicast(
        &self,
        tokens: &[String],
        notification: &Notification,
    ) -> GatewayResult<BatchResponse> {
        self.calls.lock().push(GatewayCall::Multicast {
            tokens: tokens.to_vec(),
            notification: notification.clone(),
        });
        if self.fail_batch {
            return Err(GatewayError::from_status(404, "<!DOCTYPE html>"));
        }
        let failure_count = tokens
            .iter()
            .filter(|t| self.failing_tokens.contains(*t))
            .count();
        Ok(BatchResponse {
            success_count: tokens.len() - failure_count,
            failure_count,
        })
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
