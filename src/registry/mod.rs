//! # Registry
//!
//! Topic → handler lookup table consulted by the dispatcher.

pub mod handler_registry;

pub use handler_registry::{HandlerRegistry, HandlerRegistryBuilder};
