//! Configuration management for the duel-room service
//!
//! This module handles configuration loading from environment variables and
//! TOML files, validation, and default values for the matchmaking service.

pub mod app;

// Re-export commonly used types
pub use app::{
    validate_config, AppConfig, EventSettings, MatchmakingSettings, ServiceSettings,
    StoreBackend, StoreSettings,
};
