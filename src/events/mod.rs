//! Event channel for the matchmaking service
//!
//! This module handles the AMQP connection, message envelopes and the
//! publishers that announce pool size changes and formed matches.

pub mod background;
pub mod broadcast;
pub mod connection;
pub mod messages;
pub mod publisher;

// Re-export commonly used types
pub use background::BackgroundEventPublisher;
pub use broadcast::BroadcastEventPublisher;
pub use connection::{AmqpConfig, AmqpConnection};
pub use messages::*;
pub use publisher::{
    AmqpEventPublisher, EventPublisher, FanoutEventPublisher, MockEventPublisher, PublisherConfig,
};
