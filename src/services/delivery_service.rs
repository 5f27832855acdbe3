use crate::config::DeliveryConfig;
use crate::constants::DEFAULT_FALLBACK_CONCURRENCY;
use crate::gateway::{GatewayError, PushGateway};
use crate::logging::redact_token;
use crate::models::{DeliveryOutcome, DeliveryPath, Notification, NotificationRequest};
use futures::future::join_all;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Error types for single-token delivery
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Device token is empty")]
    EmptyToken,

    #[error("Delivery to {token} failed: {source}")]
    Gateway {
        token: String,
        #[source]
        source: GatewayError,
    },
}

pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// Service wrapping the push gateway with the multicast-with-fallback strategy.
///
/// A multicast first tries one batched gateway call. If that call itself fails
/// the service degrades to per-token sends, at most `fallback_concurrency`
/// in flight at once, and waits for every token before returning. Batch
/// failures are never surfaced to the caller; only counts are.
#[derive(Clone)]
pub struct DeliveryService {
    gateway: Arc<dyn PushGateway>,
    fallback_concurrency: usize,
}

impl std::fmt::Debug for DeliveryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryService")
            .field("gateway", &self.gateway.name())
            .field("fallback_concurrency", &self.fallback_concurrency)
            .finish()
    }
}

impl DeliveryService {
    pub fn new(gateway: Arc<dyn PushGateway>) -> Self {
        Self {
            gateway,
            fallback_concurrency: DEFAULT_FALLBACK_CONCURRENCY,
        }
    }

    pub fn with_config(gateway: Arc<dyn PushGateway>, config: &DeliveryConfig) -> Self {
        Self {
            gateway,
            fallback_concurrency: config.fallback_concurrency.max(1),
        }
    }

    pub fn gateway_name(&self) -> &'static str {
        self.gateway.name()
    }

    pub fn fallback_concurrency(&self) -> usize {
        self.fallback_concurrency
    }

    /// Send to one device token, returning the gateway message id.
    ///
    /// Blank tokens are rejected without calling the gateway. No
    /// deduplication: two calls with the same token are two sends.
    pub async fn send_single(
        &self,
        token: &str,
        notification: &Notification,
    ) -> DeliveryResult<String> {
        if token.trim().is_empty() {
            return Err(DeliveryError::EmptyToken);
        }

        match self.gateway.send(token, notification).await {
            Ok(message_id) => {
                info!(
                    token = %redact_token(token),
                    message_id = %message_id,
                    "Sent push notification"
                );
                Ok(message_id)
            }
            Err(source) => {
                error!(
                    token = %redact_token(token),
                    error = %source,
                    "Failed to send push notification"
                );
                Err(DeliveryError::Gateway {
                    token: redact_token(token),
                    source,
                })
            }
        }
    }

    /// Deliver one notification to many tokens.
    ///
    /// Never fails: a failed batch call triggers per-token fallback and the
    /// returned counts always sum to the token count.
    pub async fn send_multicast(&self, request: NotificationRequest) -> DeliveryOutcome {
        let NotificationRequest {
            tokens,
            notification,
        } = request;

        if tokens.is_empty() {
            debug!("Multicast requested with no tokens");
            return DeliveryOutcome::skipped();
        }

        match self.gateway.send_multicast(&tokens, &notification).await {
            Ok(response) => {
                let (success_count, failure_count) = reconcile_counts(response.success_count, tokens.len());
                if (success_count, failure_count)
                    != (response.success_count, response.failure_count)
                {
                    warn!(
                        token_count = tokens.len(),
                        reported_success = response.success_count,
                        reported_failure = response.failure_count,
                        "Batch response counts did not match token count"
                    );
                }
                info!(
                    token_count = tokens.len(),
                    success_count = success_count,
                    failure_count = failure_count,
                    "Multicast delivered"
                );
                DeliveryOutcome::new(success_count, failure_count, DeliveryPath::Batch)
            }
            Err(e) => {
                warn!(
                    token_count = tokens.len(),
                    error = %e,
                    "Batch send failed, falling back to per-token delivery"
                );
                self.send_fallback(tokens, notification).await
            }
        }
    }

    async fn send_fallback(&self, tokens: Vec<String>, notification: Notification) -> DeliveryOutcome {
        let total = tokens.len();
        let semaphore = Arc::new(Semaphore::new(self.fallback_concurrency.min(total)));
        let notification = Arc::new(notification);
        let success = Arc::new(AtomicUsize::new(0));
        let failure = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::with_capacity(total);
        for token in tokens {
            // Admission gate: the permit is held for the lifetime of the send
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!(error = %e, "Fallback admission gate closed");
                    failure.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
            };

            let gateway = Arc::clone(&self.gateway);
            let notification = Arc::clone(&notification);
            let success = Arc::clone(&success);
            let failure = Arc::clone(&failure);

            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                match gateway.send(&token, &notification).await {
                    Ok(message_id) => {
                        success.fetch_add(1, Ordering::Relaxed);
                        debug!(
                            token = %redact_token(&token),
                            message_id = %message_id,
                            "Fallback send succeeded"
                        );
                    }
                    Err(e) => {
                        failure.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            token = %redact_token(&token),
                            error = %e,
                            "Fallback send failed"
                        );
                    }
                }
            }));
        }

        for joined in join_all(tasks).await {
            if let Err(e) = joined {
                // A send task that panicked never reached its counter
                failure.fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "Fallback send task aborted");
            }
        }

        let outcome = DeliveryOutcome::new(
            success.load(Ordering::Relaxed),
            failure.load(Ordering::Relaxed),
            DeliveryPath::Fallback,
        );
        info!(
            token_count = total,
            success_count = outcome.success_count,
            failure_count = outcome.failure_count,
            "Fallback delivery complete"
        );
        outcome
    }
}

/// Fit gateway-reported counts to the number of tokens sent. Successes are
/// capped at `total` and every other token counts as a failure.
fn reconcile_counts(success: usize, total: usize) -> (usize, usize) {
    let success = success.min(total);
    (success, total - success)
}
