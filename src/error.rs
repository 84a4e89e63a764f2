//! Error types for the matchmaking service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Corrupt queue record for player {player_id}: {reason}")]
    CorruptRecord { player_id: String, reason: String },

    #[error("Infrastructure unavailable: {message}")]
    Infrastructure { message: String },

    #[error("AMQP connection failed: {message}")]
    AmqpConnectionFailed { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl MatchmakingError {
    /// Find the matchmaking error carried by an `anyhow::Error`, if any
    pub fn classify(error: &anyhow::Error) -> Option<&MatchmakingError> {
        error.downcast_ref::<MatchmakingError>()
    }

    /// Whether the error was caused by bad caller input
    pub fn is_invalid_input(error: &anyhow::Error) -> bool {
        matches!(
            Self::classify(error),
            Some(MatchmakingError::InvalidInput { .. })
        )
    }

    /// Whether the error was caused by an unreachable store or event channel
    pub fn is_infrastructure(error: &anyhow::Error) -> bool {
        matches!(
            Self::classify(error),
            Some(MatchmakingError::Infrastructure { .. })
                | Some(MatchmakingError::AmqpConnectionFailed { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_through_anyhow() {
        let err: anyhow::Error = MatchmakingError::InvalidInput {
            reason: "playerId is required".to_string(),
        }
        .into();

        assert!(MatchmakingError::is_invalid_input(&err));
        assert!(!MatchmakingError::is_infrastructure(&err));
    }

    #[test]
    fn test_infrastructure_classification() {
        let err: anyhow::Error = MatchmakingError::Infrastructure {
            message: "connection refused".to_string(),
        }
        .into();
        assert!(MatchmakingError::is_infrastructure(&err));

        let plain = anyhow::anyhow!("something else");
        assert!(MatchmakingError::classify(&plain).is_none());
    }
}
