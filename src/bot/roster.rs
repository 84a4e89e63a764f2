//! Fixed roster of mock opponent profiles
//!
//! Profiles are handed out round-robin so consecutive fallback matches see
//! different opponents, while any profile sharing the caller's identity is
//! skipped.

use crate::error::{MatchmakingError, Result};
use crate::types::OpponentProfile;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Profiles used when no roster is configured
pub fn default_profiles() -> Vec<OpponentProfile> {
    [
        ("0x4b3d9d1f0fcb53cd86aed9ddf3aabc7f7be47c39", "Neon Marshal"),
        ("0x9e12cb128c0a732b0feb1a7f0a78eabc1f8beef0", "Shadow Raptor"),
        ("0x0f6b2f20317c2f782fe23f5f93e15b04f28a27b3", "Plasma Nomad"),
    ]
    .into_iter()
    .map(|(id, username)| OpponentProfile {
        id: id.to_string(),
        username: username.to_string(),
    })
    .collect()
}

/// Round-robin pool of mock opponents
#[derive(Debug)]
pub struct OpponentRoster {
    profiles: Vec<OpponentProfile>,
    cursor: AtomicUsize,
}

impl OpponentRoster {
    /// Create a roster; it must contain at least one profile
    pub fn new(profiles: Vec<OpponentProfile>) -> Result<Self> {
        if profiles.is_empty() {
            return Err(MatchmakingError::ConfigurationError {
                message: "Mock opponent roster cannot be empty".to_string(),
            }
            .into());
        }
        if let Some(bad) = profiles.iter().find(|p| p.id.trim().is_empty()) {
            return Err(MatchmakingError::ConfigurationError {
                message: format!("Mock opponent '{}' has an empty id", bad.username),
            }
            .into());
        }

        Ok(Self {
            profiles,
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn profiles(&self) -> &[OpponentProfile] {
        &self.profiles
    }

    /// Next profile not sharing `exclude_id` (compared case-insensitively).
    ///
    /// Falls back to the first profile when every entry is excluded.
    pub fn pick(&self, exclude_id: &str) -> OpponentProfile {
        let excluded = exclude_id.to_lowercase();
        let candidates: Vec<&OpponentProfile> = self
            .profiles
            .iter()
            .filter(|profile| profile.id.to_lowercase() != excluded)
            .collect();

        let turn = self.cursor.fetch_add(1, Ordering::Relaxed);
        candidates
            .get(turn % candidates.len().max(1))
            .map(|profile| (*profile).clone())
            .unwrap_or_else(|| self.profiles[0].clone())
    }
}

impl Default for OpponentRoster {
    fn default() -> Self {
        Self {
            profiles: default_profiles(),
            cursor: AtomicUsize::new(0),
        }
    }
}
