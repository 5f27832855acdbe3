//! # Orchestration
//!
//! Dispatch of consumed messages to handlers, and the bootstrap that wires the
//! whole pipeline together.

pub mod bootstrap;
pub mod message_dispatcher;

pub use bootstrap::{NotifierSystem, NotifierSystemHandle};
pub use message_dispatcher::{DispatchOutcome, MessageDispatcher, TopicStats};
