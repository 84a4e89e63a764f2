//! Common types used throughout the matchmaking service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for players (a wallet address in practice)
pub type PlayerId = String;

/// Identifier of the room two matched players are sent to
pub type RoomId = String;

/// Milliseconds since the Unix epoch
pub type TimestampMs = i64;

/// A player waiting in the pool, also the stored metadata record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuePlayer {
    pub id: PlayerId,
    pub username: Option<String>,
    pub joined_at: TimestampMs,
}

/// Request to join the matchmaking queue
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    #[serde(default)]
    pub player_id: PlayerId,
    #[serde(default)]
    pub username: Option<String>,
}

impl JoinRequest {
    pub fn new(player_id: impl Into<String>, username: Option<String>) -> Self {
        Self {
            player_id: player_id.into(),
            username,
        }
    }
}

/// Outcome of an enrollment attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum MatchResult {
    /// No opponent available yet
    Waiting,
    /// Paired; players are ordered opponent first, caller second
    #[serde(rename_all = "camelCase")]
    Matched {
        room_id: RoomId,
        players: [QueuePlayer; 2],
        #[serde(default)]
        is_mock: bool,
    },
}

impl MatchResult {
    pub fn is_waiting(&self) -> bool {
        matches!(self, MatchResult::Waiting)
    }

    pub fn room_id(&self) -> Option<&str> {
        match self {
            MatchResult::Waiting => None,
            MatchResult::Matched { room_id, .. } => Some(room_id),
        }
    }

    pub fn players(&self) -> Option<&[QueuePlayer; 2]> {
        match self {
            MatchResult::Waiting => None,
            MatchResult::Matched { players, .. } => Some(players),
        }
    }

    /// Short label used for logs and metrics
    pub fn outcome(&self) -> &'static str {
        match self {
            MatchResult::Waiting => "waiting",
            MatchResult::Matched { is_mock: false, .. } => "matched",
            MatchResult::Matched { is_mock: true, .. } => "mock",
        }
    }
}

/// Event announcing the current pool size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueUpdate {
    pub total: u64,
}

/// Event announcing that two players were paired
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchFound {
    pub room_id: RoomId,
    pub players: [QueuePlayer; 2],
}

/// Union type for all published matchmaking events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MatchmakingEvent {
    QueueUpdate(QueueUpdate),
    MatchFound(MatchFound),
}

impl MatchmakingEvent {
    /// Channel name the event is published under
    pub fn name(&self) -> &'static str {
        match self {
            MatchmakingEvent::QueueUpdate(_) => QUEUE_UPDATE_EVENT,
            MatchmakingEvent::MatchFound(_) => MATCH_FOUND_EVENT,
        }
    }

    /// Serialize only the payload, without the type tag
    pub fn payload_json(&self) -> serde_json::Result<String> {
        match self {
            MatchmakingEvent::QueueUpdate(event) => serde_json::to_string(event),
            MatchmakingEvent::MatchFound(event) => serde_json::to_string(event),
        }
    }
}

pub const QUEUE_UPDATE_EVENT: &str = "matchmaking.queueUpdate";
pub const MATCH_FOUND_EVENT: &str = "matchmaking.matchFound";

/// A fixed opponent profile used by the mock-opponent fallback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpponentProfile {
    pub id: PlayerId,
    pub username: String,
}

/// Snapshot of pool state for stats endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub total: u64,
    pub taken_at: DateTime<Utc>,
}
