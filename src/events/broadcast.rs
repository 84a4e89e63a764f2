//! In-process broadcast of matchmaking events
//!
//! [`BroadcastEventPublisher`] wraps a [`tokio::sync::broadcast`] channel.
//! Every connected event-stream client subscribes once and sees every
//! `queueUpdate` and `matchFound` published after it subscribed. Lagging
//! receivers lose the oldest events.

use crate::error::Result;
use crate::events::publisher::EventPublisher;
use crate::types::{MatchFound, MatchmakingEvent, QueueUpdate};
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

/// Broadcast bus for [`MatchmakingEvent`]s
#[derive(Debug, Clone)]
pub struct BroadcastEventPublisher {
    sender: broadcast::Sender<MatchmakingEvent>,
}

impl BroadcastEventPublisher {
    /// Creates a bus holding at most `capacity` undelivered events per receiver
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event, returning how many receivers got it.
    ///
    /// Having no receivers is not an error.
    pub fn send(&self, event: MatchmakingEvent) -> usize {
        let name = event.name();
        let delivered = self.sender.send(event).unwrap_or(0);
        debug!("Broadcast {} to {} subscribers", name, delivered);
        delivered
    }

    /// New receiver for all future events
    pub fn subscribe(&self) -> broadcast::Receiver<MatchmakingEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl EventPublisher for BroadcastEventPublisher {
    async fn publish_queue_update(&self, event: QueueUpdate) -> Result<()> {
        self.send(MatchmakingEvent::QueueUpdate(event));
        Ok(())
    }

    async fn publish_match_found(&self, event: MatchFound) -> Result<()> {
        self.send(MatchmakingEvent::MatchFound(event));
        Ok(())
    }
}
