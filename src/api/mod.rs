//! Matchmaking HTTP API
//!
//! All endpoints are mounted under `/matchmaking`.

pub mod error;
pub mod handlers;

use crate::events::BroadcastEventPublisher;
use crate::queue::QueueCoordinator;
use axum::routing::{get, post};
use axum::Router;

pub use error::{ApiError, ErrorResponse};

/// Shared state for the matchmaking routes
#[derive(Clone)]
pub struct ApiState {
    pub coordinator: QueueCoordinator,
    /// Source for the event stream; must be one of the coordinator's publishers
    pub events: BroadcastEventPublisher,
}

impl ApiState {
    pub fn new(coordinator: QueueCoordinator, events: BroadcastEventPublisher) -> Self {
        Self {
            coordinator,
            events,
        }
    }
}

/// Builds the matchmaking router
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/matchmaking/join", post(handlers::join))
        .route("/matchmaking/queue", get(handlers::queue_size))
        .route("/matchmaking/events", get(handlers::events))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventPublisher, FanoutEventPublisher, MockEventPublisher};
    use crate::store::MemoryQueueStore;
    use crate::types::MatchResult;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use futures::StreamExt;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt; // for oneshot

    struct TestApi {
        router: Router,
        store: Arc<MemoryQueueStore>,
        events: BroadcastEventPublisher,
    }

    fn test_api() -> TestApi {
        let store = Arc::new(MemoryQueueStore::new());
        let events = BroadcastEventPublisher::new(16);
        let targets: Vec<Arc<dyn EventPublisher>> =
            vec![Arc::new(events.clone()), Arc::new(MockEventPublisher::new())];
        let coordinator =
            QueueCoordinator::new(store.clone(), Arc::new(FanoutEventPublisher::new(targets)));

        TestApi {
            router: router(ApiState::new(coordinator, events.clone())),
            store,
            events,
        }
    }

    fn join_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/matchmaking/join")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_join_then_match() {
        let api = test_api();

        let response = api
            .router
            .clone()
            .oneshot(join_request(r#"{"playerId":"0xa","username":"Ann"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "waiting");

        let response = api
            .router
            .clone()
            .oneshot(join_request(r#"{"playerId":"0xb"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "matched");
        assert_eq!(body["players"][0]["id"], "0xa");
        assert_eq!(body["players"][0]["username"], "Ann");
        assert_eq!(body["players"][1]["id"], "0xb");
        assert!(body["roomId"].is_string());

        let result: MatchResult = serde_json::from_value(body).unwrap();
        assert!(!result.is_waiting());
    }

    #[tokio::test]
    async fn test_missing_player_id_is_bad_request() {
        let api = test_api();

        for body in [r#"{}"#, r#"{"playerId":"  "}"#, "not json"] {
            let response = api.router.clone().oneshot(join_request(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
        }
        assert_eq!(api.store.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_store_outage_is_service_unavailable() {
        let api = test_api();
        api.store.set_online(false);

        let response = api
            .router
            .clone()
            .oneshot(join_request(r#"{"playerId":"0xa"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["error"]["kind"], "infrastructure");
    }

    #[tokio::test]
    async fn test_queue_size_endpoint() {
        let api = test_api();
        api.router
            .clone()
            .oneshot(join_request(r#"{"playerId":"0xa"}"#))
            .await
            .unwrap();

        let response = api
            .router
            .oneshot(
                Request::builder()
                    .uri("/matchmaking/queue")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["total"], 1);
    }

    #[tokio::test]
    async fn test_event_stream_delivers_named_events() {
        let api = test_api();

        let response = api
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/matchmaking/events")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
        assert!(content_type
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));
        assert_eq!(api.events.receiver_count(), 1);

        api.events
            .publish_queue_update(crate::types::QueueUpdate { total: 3 })
            .await
            .unwrap();

        let mut frames = response.into_body().into_data_stream();
        let frame = tokio::time::timeout(Duration::from_secs(1), frames.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let text = String::from_utf8(frame.to_vec()).unwrap();
        assert!(text.contains("event: matchmaking.queueUpdate"));
        assert!(text.contains(r#"data: {"total":3}"#));
    }
}
