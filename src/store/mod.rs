//! Shared store holding the waiting pool
//!
//! This module defines the store capability set the coordinator depends on,
//! an in-memory implementation and a Redis-backed one.

pub mod memory;
pub mod provider;
pub mod redis_store;

// Re-export commonly used types
pub use memory::MemoryQueueStore;
pub use provider::{QueueStore, StoreBatch, StoreOp};
pub use redis_store::{RedisQueueStore, RedisStoreConfig};
