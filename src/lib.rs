//! Duel Room - two-player matchmaking queue for card duels
//!
//! This crate enrolls players into a shared waiting pool, pairs the two
//! longest-waiting players, expires abandoned entries and announces pool
//! size changes and formed matches to subscribers.

pub mod api;
pub mod bot;
pub mod config;
pub mod error;
pub mod events;
pub mod metrics;
pub mod queue;
pub mod service;
pub mod store;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use bot::PairingFallbackPolicy;
pub use events::EventPublisher;
pub use queue::{QueueCoordinator, QueueSettings};
pub use store::{MemoryQueueStore, QueueStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
