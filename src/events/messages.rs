//! Event message definitions and serialization

use crate::error::{MatchmakingError, Result};
use crate::types::*;
use serde_json;

/// Default exchange for outbound matchmaking events
pub const MATCHMAKING_EVENTS_EXCHANGE: &str = "matchmaking.events";

/// Routing keys for events
pub const QUEUE_UPDATE_ROUTING_KEY: &str = QUEUE_UPDATE_EVENT;
pub const MATCH_FOUND_ROUTING_KEY: &str = MATCH_FOUND_EVENT;

/// Message envelope with metadata
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MessageEnvelope<T> {
    pub payload: T,
    pub correlation_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub routing_key: String,
}

impl<T> MessageEnvelope<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    /// Create a new message envelope
    pub fn new(payload: T, routing_key: String) -> Self {
        Self {
            payload,
            correlation_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now(),
            routing_key,
        }
    }

    /// Serialize the envelope to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            MatchmakingError::InternalError {
                message: format!("Failed to serialize message: {}", e),
            }
            .into()
        })
    }

    /// Deserialize envelope from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            MatchmakingError::InvalidInput {
                reason: format!("Failed to deserialize message: {}", e),
            }
            .into()
        })
    }
}

/// Wrap an event in an envelope routed by its event name
pub fn envelope_for(event: MatchmakingEvent) -> MessageEnvelope<MatchmakingEvent> {
    let routing_key = event.name().to_string();
    MessageEnvelope::new(event, routing_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn match_found() -> MatchFound {
        let player = |id: &str| QueuePlayer {
            id: id.to_string(),
            username: Some(format!("{}-name", id)),
            joined_at: 1_700_000_000_000,
        };
        MatchFound {
            room_id: "room-42".to_string(),
            players: [player("0xa"), player("0xb")],
        }
    }

    #[test]
    fn test_envelope_routing_follows_event_name() {
        let envelope = envelope_for(MatchmakingEvent::MatchFound(match_found()));
        assert_eq!(envelope.routing_key, MATCH_FOUND_ROUTING_KEY);
        assert!(!envelope.correlation_id.is_empty());

        let envelope = envelope_for(MatchmakingEvent::QueueUpdate(QueueUpdate { total: 2 }));
        assert_eq!(envelope.routing_key, "matchmaking.queueUpdate");
    }

    #[test]
    fn test_envelope_bytes_are_json() {
        let envelope = envelope_for(MatchmakingEvent::MatchFound(match_found()));
        let bytes = envelope.to_bytes().unwrap();
        let decoded = MessageEnvelope::<MatchmakingEvent>::from_bytes(&bytes).unwrap();

        assert_eq!(decoded.correlation_id, envelope.correlation_id);
        assert_eq!(decoded.payload, envelope.payload);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let err = MessageEnvelope::<MatchmakingEvent>::from_bytes(b"not json").unwrap_err();
        assert!(MatchmakingError::is_invalid_input(&err));
    }
}
