//! HTTP error mapping for the matchmaking API

use crate::error::MatchmakingError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// JSON error body: `{"error": {"kind": "...", "message": "..."}}`
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
}

/// Error returned by API handlers
#[derive(Debug)]
pub struct ApiError(anyhow::Error);

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(
            MatchmakingError::InvalidInput {
                reason: message.into(),
            }
            .into(),
        )
    }

    pub fn status_code(&self) -> StatusCode {
        match MatchmakingError::classify(&self.0) {
            Some(MatchmakingError::InvalidInput { .. }) => StatusCode::BAD_REQUEST,
            Some(MatchmakingError::Infrastructure { .. })
            | Some(MatchmakingError::AmqpConnectionFailed { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match MatchmakingError::classify(&self.0) {
            Some(MatchmakingError::InvalidInput { .. }) => "invalid_input",
            Some(MatchmakingError::Infrastructure { .. })
            | Some(MatchmakingError::AmqpConnectionFailed { .. }) => "infrastructure",
            _ => "internal",
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                kind: self.kind(),
                message: self.0.to_string(),
            },
        };
        let mut response = Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(error: MatchmakingError) -> StatusCode {
        ApiError::from(anyhow::Error::from(error)).status_code()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_of(MatchmakingError::InvalidInput {
                reason: "x".to_string()
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(MatchmakingError::Infrastructure {
                message: "down".to_string()
            }),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(MatchmakingError::InternalError {
                message: "bug".to_string()
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(anyhow::anyhow!("untyped")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
