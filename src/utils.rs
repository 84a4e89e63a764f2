//! Utility functions for the matchmaking service

use crate::types::TimestampMs;
use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

/// Prefix carried by room ids of fallback matches
pub const MOCK_ROOM_PREFIX: &str = "mock-";

/// Generate a new unique room ID
pub fn generate_room_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a room ID for a match against a mock opponent
pub fn generate_mock_room_id() -> String {
    format!("{}{}", MOCK_ROOM_PREFIX, generate_room_id())
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Get the current time in milliseconds since the Unix epoch
pub fn current_timestamp_ms() -> TimestampMs {
    Utc::now().timestamp_millis()
}

/// Whether an entry enrolled at `joined_at` has outlived `ttl` at `now`
pub fn is_stale(joined_at: TimestampMs, now: TimestampMs, ttl: Duration) -> bool {
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    now.saturating_sub(joined_at) > ttl_ms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique_ids() {
        let id1 = generate_room_id();
        let id2 = generate_room_id();
        assert_ne!(id1, id2);
        assert!(Uuid::parse_str(&id1).is_ok());

        let mock = generate_mock_room_id();
        assert!(mock.starts_with(MOCK_ROOM_PREFIX));
    }

    #[test]
    fn test_is_stale_boundary() {
        let ttl = Duration::from_millis(300_000);
        assert!(!is_stale(1_000, 1_000, ttl));
        assert!(!is_stale(1_000, 301_000, ttl));
        assert!(is_stale(1_000, 301_001, ttl));
    }

    #[test]
    fn test_is_stale_with_future_timestamp() {
        let ttl = Duration::from_secs(1);
        assert!(!is_stale(10_000, 5_000, ttl));
    }
}
