use crate::config::ConfigurationError;
use crate::gateway::GatewayError;
use crate::messaging::MessagingError;

/// Top-level error surfaced by bootstrap and lifecycle operations.
///
/// The dispatch path itself never returns this type: broker, decode and
/// delivery failures are logged where they happen and do not escape the
/// consumer loop.
#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Messaging(#[from] MessagingError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl NotifierError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

pub type Result<T> = std::result::Result<T, NotifierError>;
