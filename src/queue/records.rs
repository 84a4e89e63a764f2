//! Stored pool records
//!
//! The pool itself is an ordered set of player ids. Each member also has a
//! JSON metadata record stored under its own expiring key; a member whose
//! record is missing, unreadable or too old is not eligible for pairing.

use crate::error::MatchmakingError;
use crate::types::{QueuePlayer, TimestampMs};
use crate::utils::is_stale;
use std::time::Duration;

/// Key layout for the pool and its metadata records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueKeys {
    pub queue_key: String,
    pub player_key_prefix: String,
}

impl QueueKeys {
    pub fn new(queue_key: impl Into<String>, player_key_prefix: impl Into<String>) -> Self {
        Self {
            queue_key: queue_key.into(),
            player_key_prefix: player_key_prefix.into(),
        }
    }

    /// Metadata key for a player
    pub fn player_key(&self, player_id: &str) -> String {
        format!("{}{}", self.player_key_prefix, player_id)
    }
}

impl Default for QueueKeys {
    fn default() -> Self {
        Self::new("cza:matchmaking:queue", "cza:matchmaking:player:")
    }
}

/// What a metadata lookup turned up
#[derive(Debug)]
pub enum PlayerRecord {
    Live(QueuePlayer),
    Absent,
    Stale(QueuePlayer),
    Corrupt(MatchmakingError),
}

impl PlayerRecord {
    /// The player, if eligible for pairing
    pub fn live(self) -> Option<QueuePlayer> {
        match self {
            PlayerRecord::Live(player) => Some(player),
            _ => None,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, PlayerRecord::Live(_))
    }
}

/// Serialize a player for storage
pub fn encode_player(player: &QueuePlayer) -> serde_json::Result<String> {
    serde_json::to_string(player)
}

/// Decode a stored record for `player_id` and check its age
pub fn decode_player(
    raw: Option<&str>,
    player_id: &str,
    now: TimestampMs,
    ttl: Duration,
) -> PlayerRecord {
    let Some(raw) = raw else {
        return PlayerRecord::Absent;
    };

    let player: QueuePlayer = match serde_json::from_str(raw) {
        Ok(player) => player,
        Err(e) => {
            return PlayerRecord::Corrupt(MatchmakingError::CorruptRecord {
                player_id: player_id.to_string(),
                reason: e.to_string(),
            })
        }
    };

    if player.id != player_id {
        return PlayerRecord::Corrupt(MatchmakingError::CorruptRecord {
            player_id: player_id.to_string(),
            reason: format!("record belongs to '{}'", player.id),
        });
    }

    if is_stale(player.joined_at, now, ttl) {
        return PlayerRecord::Stale(player);
    }

    PlayerRecord::Live(player)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(300);

    fn stored(id: &str, joined_at: i64) -> String {
        encode_player(&QueuePlayer {
            id: id.to_string(),
            username: Some("Ann".to_string()),
            joined_at,
        })
        .unwrap()
    }

    #[test]
    fn test_player_key_layout() {
        let keys = QueueKeys::default();
        assert_eq!(keys.queue_key, "cza:matchmaking:queue");
        assert_eq!(keys.player_key("0xabc"), "cza:matchmaking:player:0xabc");
    }

    #[test]
    fn test_live_record() {
        let raw = stored("0xabc", 1_000);
        let record = decode_player(Some(&raw), "0xabc", 2_000, TTL);
        let player = record.live().unwrap();
        assert_eq!(player.username.as_deref(), Some("Ann"));
    }

    #[test]
    fn test_missing_record() {
        assert!(matches!(
            decode_player(None, "0xabc", 0, TTL),
            PlayerRecord::Absent
        ));
    }

    #[test]
    fn test_stale_record_boundary() {
        let raw = stored("0xabc", 0);
        assert!(decode_player(Some(&raw), "0xabc", 300_000, TTL).is_live());
        assert!(matches!(
            decode_player(Some(&raw), "0xabc", 300_001, TTL),
            PlayerRecord::Stale(_)
        ));
    }

    #[test]
    fn test_corrupt_records() {
        let cases = [
            "not json",
            r#"{"id":"0xabc","username":null}"#,
            r#"{"id":"0xabc","username":null,"joinedAt":"soon"}"#,
        ];
        for raw in cases {
            assert!(matches!(
                decode_player(Some(raw), "0xabc", 0, TTL),
                PlayerRecord::Corrupt(MatchmakingError::CorruptRecord { .. })
            ));
        }
    }

    #[test]
    fn test_record_for_other_player_is_corrupt() {
        let raw = stored("0xother", 1_000);
        assert!(matches!(
            decode_player(Some(&raw), "0xabc", 1_000, TTL),
            PlayerRecord::Corrupt(_)
        ));
    }
}
