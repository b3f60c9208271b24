//! AMQP integration for out-of-process notifications
//!
//! This module handles the bus connection and event publishing. Bus
//! messages are durable best-effort notifications; their loss never
//! blocks the core loop.

pub mod connection;
pub mod messages;
pub mod publisher;

// Re-export commonly used types
pub use connection::{AmqpConfig, AmqpConnection};
pub use messages::*;
pub use publisher::{AmqpEventPublisher, EventPublisher, MockEventPublisher};
