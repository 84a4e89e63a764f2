//! Pairing fallback policy
//!
//! When a caller ends up alone in the pool, the coordinator asks the policy
//! whether to hand out a synthetic match instead of leaving the caller
//! waiting. The real pairing algorithm never looks at the roster itself.

use crate::bot::roster::OpponentRoster;
use crate::types::{MatchResult, QueuePlayer, TimestampMs};
use crate::utils::generate_mock_room_id;
use std::sync::Arc;

/// What to do when a caller is alone in the pool
#[derive(Debug, Clone, Default)]
pub enum PairingFallbackPolicy {
    /// Leave the caller waiting
    #[default]
    None,
    /// Pair the caller with a profile from the roster
    MockOpponent(Arc<OpponentRoster>),
}

impl PairingFallbackPolicy {
    /// Mock-opponent policy over the default roster
    pub fn mock_opponent() -> Self {
        Self::MockOpponent(Arc::new(OpponentRoster::default()))
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::MockOpponent(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::MockOpponent(_) => "mock_opponent",
        }
    }

    /// Build a mock match for `caller`, or `None` when the policy is disabled.
    ///
    /// The mock opponent is placed first, matching real matches.
    pub fn mock_match(&self, caller: &QueuePlayer, now: TimestampMs) -> Option<MatchResult> {
        let Self::MockOpponent(roster) = self else {
            return None;
        };

        let profile = roster.pick(&caller.id);
        let opponent = QueuePlayer {
            id: profile.id,
            username: Some(profile.username),
            joined_at: now,
        };

        Some(MatchResult::Matched {
            room_id: generate_mock_room_id(),
            players: [opponent, caller.clone()],
            is_mock: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::MOCK_ROOM_PREFIX;

    fn caller() -> QueuePlayer {
        QueuePlayer {
            id: "0xcaller".to_string(),
            username: Some("Caller".to_string()),
            joined_at: 500,
        }
    }

    #[test]
    fn test_disabled_policy_builds_nothing() {
        let policy = PairingFallbackPolicy::None;
        assert!(!policy.is_enabled());
        assert_eq!(policy.name(), "none");
        assert!(policy.mock_match(&caller(), 1_000).is_none());
    }

    #[test]
    fn test_mock_match_shape() {
        let policy = PairingFallbackPolicy::mock_opponent();
        assert!(policy.is_enabled());

        let result = policy.mock_match(&caller(), 1_000).unwrap();
        match result {
            MatchResult::Matched {
                room_id,
                players,
                is_mock,
            } => {
                assert!(is_mock);
                assert!(room_id.starts_with(MOCK_ROOM_PREFIX));
                assert_eq!(players[1], caller());
                assert_eq!(players[0].joined_at, 1_000);
                assert!(players[0].username.is_some());
            }
            MatchResult::Waiting => panic!("expected a mock match"),
        }
    }
}
