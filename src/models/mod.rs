//! # Models
//!
//! Decoded event payloads and the notification types handed to delivery.

pub mod events;
pub mod notification;
pub mod payload;

pub use events::{
    AudioAnalysisCompletedEvent, DecodeError, DomainEvent, Platform, UserDeregisteredEvent,
    UserRegisteredEvent,
};
pub use notification::{
    DeliveryOutcome, DeliveryPath, Notification, NotificationData, NotificationRequest,
};
