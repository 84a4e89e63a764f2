//! Detached event publishing
//!
//! Wraps a slow publisher (the AMQP leg with its retry backoff) behind a
//! bounded queue drained by a spawned worker, so callers only pay for the
//! enqueue.

use crate::error::{MatchmakingError, Result};
use crate::events::publisher::EventPublisher;
use crate::types::{MatchFound, MatchmakingEvent, QueueUpdate};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Forwards events to `target` from a background task, in publish order
#[derive(Clone)]
pub struct BackgroundEventPublisher {
    sender: mpsc::Sender<MatchmakingEvent>,
}

impl BackgroundEventPublisher {
    /// Spawn the worker; must be called inside a tokio runtime
    pub fn spawn(target: Arc<dyn EventPublisher>, capacity: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<MatchmakingEvent>(capacity.max(1));

        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                let name = event.name();
                let published = match event {
                    MatchmakingEvent::QueueUpdate(update) => {
                        target.publish_queue_update(update).await
                    }
                    MatchmakingEvent::MatchFound(found) => target.publish_match_found(found).await,
                };
                if let Err(e) = published {
                    warn!("Background publish of {} failed: {}", name, e);
                }
            }
            debug!("Background event publisher stopped");
        });

        Self { sender }
    }

    fn enqueue(&self, event: MatchmakingEvent) -> Result<()> {
        let name = event.name();
        self.sender.try_send(event).map_err(|e| {
            MatchmakingError::InternalError {
                message: format!("Dropped {} event: {}", name, e),
            }
            .into()
        })
    }
}

#[async_trait]
impl EventPublisher for BackgroundEventPublisher {
    async fn publish_queue_update(&self, event: QueueUpdate) -> Result<()> {
        self.enqueue(MatchmakingEvent::QueueUpdate(event))
    }

    async fn publish_match_found(&self, event: MatchFound) -> Result<()> {
        self.enqueue(MatchmakingEvent::MatchFound(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MockEventPublisher;
    use std::time::Duration;

    struct StalledPublisher;

    #[async_trait]
    impl EventPublisher for StalledPublisher {
        async fn publish_queue_update(&self, _event: QueueUpdate) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }

        async fn publish_match_found(&self, _event: MatchFound) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_publish_does_not_wait_for_target() {
        let publisher = BackgroundEventPublisher::spawn(Arc::new(StalledPublisher), 8);

        let published = tokio::time::timeout(
            Duration::from_millis(200),
            publisher.publish_queue_update(QueueUpdate { total: 1 }),
        )
        .await;

        assert!(matches!(published, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_events_forwarded_in_order() {
        let target = Arc::new(MockEventPublisher::new());
        let publisher = BackgroundEventPublisher::spawn(target.clone(), 8);

        for total in [2, 1, 0] {
            publisher
                .publish_queue_update(QueueUpdate { total })
                .await
                .unwrap();
        }

        for _ in 0..100 {
            if target.queue_totals().len() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(target.queue_totals(), vec![2, 1, 0]);
    }

    #[tokio::test]
    async fn test_full_queue_rejects_event() {
        let publisher = BackgroundEventPublisher::spawn(Arc::new(StalledPublisher), 1);

        // The worker takes the first event and stalls; the second fills the queue
        publisher
            .publish_queue_update(QueueUpdate { total: 1 })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        publisher
            .publish_queue_update(QueueUpdate { total: 2 })
            .await
            .unwrap();

        assert!(publisher
            .publish_queue_update(QueueUpdate { total: 3 })
            .await
            .is_err());
    }
}
