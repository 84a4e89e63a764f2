//! Mock-opponent fallback for an empty pool
//!
//! This module holds the roster of synthetic opponents and the policy that
//! decides whether a lone caller is paired with one of them.

pub mod fallback;
pub mod roster;

pub use fallback::PairingFallbackPolicy;
pub use roster::{default_profiles, OpponentRoster};
