use serde::Serialize;
use std::collections::BTreeMap;

/// String key/value pairs delivered alongside the visible notification
pub type NotificationData = BTreeMap<String, String>;

/// Visible content plus data map of one push notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub data: NotificationData,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            data: NotificationData::new(),
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// A notification addressed to one or more device tokens.
///
/// Built by a handler and moved into the delivery service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub tokens: Vec<String>,
    pub notification: Notification,
}

impl NotificationRequest {
    pub fn new(tokens: Vec<String>, notification: Notification) -> Self {
        Self {
            tokens,
            notification,
        }
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }
}

/// Which delivery path produced an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryPath {
    /// No tokens, nothing sent
    #[default]
    Skipped,
    /// One gateway call for one token
    Single,
    /// One batched gateway call
    Batch,
    /// Per-token sends after the batched call failed
    Fallback,
}

/// Success/failure counts of one delivery. Logged, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeliveryOutcome {
    pub success_count: usize,
    pub failure_count: usize,
    pub path: DeliveryPath,
}

impl DeliveryOutcome {
    pub fn skipped() -> Self {
        Self::default()
    }

    pub fn new(success_count: usize, failure_count: usize, path: DeliveryPath) -> Self {
        Self {
            success_count,
            failure_count,
            path,
        }
    }

    pub fn total(&self) -> usize {
        self.success_count + self.failure_count
    }
}
