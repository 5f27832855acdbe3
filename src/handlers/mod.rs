//! # Event Handlers
//!
//! One handler per topic. A handler decodes its topic's payload, builds the
//! notification and hands it to the [`DeliveryService`]. Handlers are pure
//! transformers: they hold no per-message state and are shared across
//! dispatches.
//!
//! ## Routing
//!
//! | Topic | Tokens | Delivery |
//! |---|---|---|
//! | `user.registered` | `deviceToken` / `deviceTokens` | single send for one token, multicast for more |
//! | `user.deregistered` | `deviceTokens` | nothing when empty, otherwise multicast |
//! | `audio.analyze.completed` | `deviceTokens` | single send for one token, multicast for more |
//! | diagnostic | none | logs receipt only |

pub mod audio_analysis_completed;
pub mod diagnostic;
pub mod user_deregistered;
pub mod user_registered;

use crate::models::{DecodeError, DeliveryOutcome, DeliveryPath, Notification, NotificationRequest};
use crate::services::{DeliveryError, DeliveryService};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub use audio_analysis_completed::AudioAnalysisCompletedHandler;
pub use diagnostic::DiagnosticHandler;
pub use user_deregistered::UserDeregisteredHandler;
pub use user_registered::UserRegisteredHandler;

/// Failures a handler reports to the dispatcher
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("Failed to decode {event}: {source}")]
    Decode {
        event: &'static str,
        #[source]
        source: DecodeError,
    },

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

impl HandlerError {
    pub fn decode(event: &'static str, source: DecodeError) -> Self {
        Self::Decode { event, source }
    }
}

pub type HandlerResult<T> = Result<T, HandlerError>;

/// What a handler did with a successfully decoded message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Notification handed to the delivery service
    Delivered(DeliveryOutcome),
    /// Decoded fine, but there was no device to notify
    NoDevices,
    /// Receipt logged, nothing to deliver
    Logged,
}

#[async_trait]
pub trait MessageHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, payload: &[u8]) -> HandlerResult<HandleOutcome>;
}

/// Dependencies injected into every handler at registry build time
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub delivery: Arc<DeliveryService>,
}

impl HandlerContext {
    pub fn new(delivery: Arc<DeliveryService>) -> Self {
        Self { delivery }
    }
}

/// Constructs a handler instance from the shared context
pub type HandlerFactory =
    Arc<dyn Fn(&HandlerContext) -> Arc<dyn MessageHandler> + Send + Sync>;

/// Handler implementations selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    Diagnostic,
    UserRegistered,
    UserDeregistered,
    AudioAnalysisCompleted,
}

impl HandlerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerKind::Diagnostic => "diagnostic",
            HandlerKind::UserRegistered => "user_registered",
            HandlerKind::UserDeregistered => "user_deregistered",
            HandlerKind::AudioAnalysisCompleted => "audio_analysis_completed",
        }
    }

    pub fn factory(self) -> HandlerFactory {
        match self {
            HandlerKind::Diagnostic => Arc::new(|_ctx: &HandlerContext| {
                Arc::new(DiagnosticHandler::new()) as Arc<dyn MessageHandler>
            }),
            HandlerKind::UserRegistered => Arc::new(|ctx: &HandlerContext| {
                Arc::new(UserRegisteredHandler::new(ctx.delivery.clone())) as Arc<dyn MessageHandler>
            }),
            HandlerKind::UserDeregistered => Arc::new(|ctx: &HandlerContext| {
                Arc::new(UserDeregisteredHandler::new(ctx.delivery.clone()))
                    as Arc<dyn MessageHandler>
            }),
            HandlerKind::AudioAnalysisCompleted => Arc::new(|ctx: &HandlerContext| {
                Arc::new(AudioAnalysisCompletedHandler::new(ctx.delivery.clone()))
                    as Arc<dyn MessageHandler>
            }),
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single send for exactly one token, multicast otherwise.
///
/// A failed single send is returned as an error; multicast failures only
/// show up in the counts.
pub(crate) async fn deliver_to_tokens(
    delivery: &DeliveryService,
    tokens: Vec<String>,
    notification: Notification,
) -> HandlerResult<HandleOutcome> {
    match tokens.as_slice() {
        [] => Ok(HandleOutcome::NoDevices),
        [token] => {
            delivery.send_single(token, &notification).await?;
            Ok(HandleOutcome::Delivered(DeliveryOutcome::new(
                1,
                0,
                DeliveryPath::Single,
            )))
        }
        _ => {
            let outcome = delivery
                .send_multicast(NotificationRequest::new(tokens, notification))
                .await;
            Ok(HandleOutcome::Delivered(outcome))
        }
    }
}
