//! Test fixtures and mock implementations for integration testing

#![allow(dead_code)]

use async_trait::async_trait;
use duel_room::error::Result;
use duel_room::events::EventPublisher;
use duel_room::queue::{ManualClock, QueueCoordinator, QueueKeys};
use duel_room::store::MemoryQueueStore;
use duel_room::types::{JoinRequest, MatchFound, MatchmakingEvent, QueueUpdate};
use mockall::mock;
use std::sync::{Arc, Mutex};

/// Start time for the manual clock, far enough from zero to subtract TTLs
pub const START_MS: i64 = 1_700_000_000_000;

/// Event publisher that records every event in arrival order
#[derive(Debug, Default)]
pub struct RecordingEventPublisher {
    published_events: Arc<Mutex<Vec<MatchmakingEvent>>>,
}

impl RecordingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all published events (for testing)
    pub fn events(&self) -> Vec<MatchmakingEvent> {
        self.published_events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Channel names of the published events, in order
    pub fn event_names(&self) -> Vec<&'static str> {
        self.events().iter().map(MatchmakingEvent::name).collect()
    }

    pub fn match_found(&self) -> Vec<MatchFound> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                MatchmakingEvent::MatchFound(found) => Some(found),
                _ => None,
            })
            .collect()
    }

    pub fn last_total(&self) -> Option<u64> {
        self.events().into_iter().rev().find_map(|event| match event {
            MatchmakingEvent::QueueUpdate(update) => Some(update.total),
            _ => None,
        })
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish_queue_update(&self, event: QueueUpdate) -> Result<()> {
        if let Ok(mut events) = self.published_events.lock() {
            events.push(MatchmakingEvent::QueueUpdate(event));
        }
        Ok(())
    }

    async fn publish_match_found(&self, event: MatchFound) -> Result<()> {
        if let Ok(mut events) = self.published_events.lock() {
            events.push(MatchmakingEvent::MatchFound(event));
        }
        Ok(())
    }
}

mock! {
    pub Publisher {}

    #[async_trait]
    impl EventPublisher for Publisher {
        async fn publish_queue_update(&self, event: QueueUpdate) -> Result<()>;
        async fn publish_match_found(&self, event: MatchFound) -> Result<()>;
    }
}

/// A complete in-memory system driven by a manual clock
pub struct TestSystem {
    pub coordinator: QueueCoordinator,
    pub store: Arc<MemoryQueueStore>,
    pub clock: Arc<ManualClock>,
    pub publisher: Arc<RecordingEventPublisher>,
}

impl TestSystem {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(START_MS));
        let store = Arc::new(MemoryQueueStore::with_clock(clock.clone()));
        let publisher = Arc::new(RecordingEventPublisher::new());
        let coordinator =
            QueueCoordinator::new(store.clone(), publisher.clone()).with_clock(clock.clone());

        Self {
            coordinator,
            store,
            clock,
            publisher,
        }
    }

    /// Player ids currently in the pool, earliest first
    pub fn pool(&self) -> Vec<String> {
        self.store.members(&QueueKeys::default().queue_key)
    }
}

pub fn join(player_id: &str) -> JoinRequest {
    JoinRequest::new(player_id, None)
}

pub fn join_named(player_id: &str, username: &str) -> JoinRequest {
    JoinRequest::new(player_id, Some(username.to_string()))
}
