//! Event publishers for outbound matchmaking events

use crate::error::{MatchmakingError, Result};
use crate::events::connection::next_backoff;
use crate::events::messages::{envelope_for, MessageEnvelope, MATCHMAKING_EVENTS_EXCHANGE};
use crate::types::*;
use amqprs::{
    channel::{BasicPublishArguments, Channel, ExchangeDeclareArguments},
    BasicProperties,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Trait for publishing matchmaking events
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish the current pool size
    async fn publish_queue_update(&self, event: QueueUpdate) -> Result<()>;

    /// Publish a newly formed match
    async fn publish_match_found(&self, event: MatchFound) -> Result<()>;
}

/// Configuration for event publishing
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub exchange_name: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            exchange_name: MATCHMAKING_EVENTS_EXCHANGE.to_string(),
            max_retries: 3,
            retry_delay_ms: 500,
        }
    }
}

/// AMQP-based event publisher implementation
pub struct AmqpEventPublisher {
    channel: Channel,
    config: PublisherConfig,
}

impl AmqpEventPublisher {
    /// Create a new event publisher
    pub async fn new(channel: Channel, config: PublisherConfig) -> Result<Self> {
        let publisher = Self { channel, config };

        publisher.setup_exchange().await?;

        Ok(publisher)
    }

    /// Declare the topic exchange events are published to
    async fn setup_exchange(&self) -> Result<()> {
        let args = ExchangeDeclareArguments::new(&self.config.exchange_name, "topic");
        self.channel.exchange_declare(args).await.map_err(|e| {
            MatchmakingError::AmqpConnectionFailed {
                message: format!(
                    "Failed to declare exchange {}: {}",
                    self.config.exchange_name, e
                ),
            }
        })?;

        info!(
            "Successfully declared AMQP exchange '{}'",
            self.config.exchange_name
        );
        Ok(())
    }

    /// Publish an envelope with retry logic
    async fn publish_with_retry(&self, envelope: &MessageEnvelope<MatchmakingEvent>) -> Result<()> {
        let mut retry_count = 0;
        let mut delay = Duration::from_millis(self.config.retry_delay_ms);

        loop {
            match self.try_publish(envelope).await {
                Ok(_) => {
                    debug!(
                        "Successfully published message {} to exchange {}",
                        envelope.correlation_id, self.config.exchange_name
                    );
                    return Ok(());
                }
                Err(e) => {
                    retry_count += 1;
                    if retry_count > self.config.max_retries {
                        error!(
                            "Failed to publish message {} after {} retries: {}",
                            envelope.correlation_id, self.config.max_retries, e
                        );
                        return Err(e);
                    }

                    warn!(
                        "Publish attempt {} failed for message {}: {}. Retrying in {:?}",
                        retry_count, envelope.correlation_id, e, delay
                    );

                    sleep(delay).await;
                    delay = next_backoff(delay, Duration::from_secs(5));
                }
            }
        }
    }

    /// Single publish attempt
    async fn try_publish(&self, envelope: &MessageEnvelope<MatchmakingEvent>) -> Result<()> {
        let payload = envelope.to_bytes()?;

        let args = BasicPublishArguments::new(&self.config.exchange_name, &envelope.routing_key);
        let mut properties = BasicProperties::default();
        properties
            .with_message_id(&envelope.correlation_id)
            .with_timestamp(envelope.timestamp.timestamp() as u64)
            .with_content_type("application/json");

        self.channel
            .basic_publish(properties, payload, args)
            .await
            .map_err(|e| MatchmakingError::AmqpConnectionFailed {
                message: format!("Failed to publish message: {}", e),
            })?;

        Ok(())
    }
}

#[async_trait]
impl EventPublisher for AmqpEventPublisher {
    async fn publish_queue_update(&self, event: QueueUpdate) -> Result<()> {
        let envelope = envelope_for(MatchmakingEvent::QueueUpdate(event));
        self.publish_with_retry(&envelope).await
    }

    async fn publish_match_found(&self, event: MatchFound) -> Result<()> {
        let envelope = envelope_for(MatchmakingEvent::MatchFound(event));
        self.publish_with_retry(&envelope).await
    }
}

/// Publishes every event to several publishers
///
/// All targets are attempted; the first failure is returned after the rest ran.
#[derive(Clone, Default)]
pub struct FanoutEventPublisher {
    targets: Vec<Arc<dyn EventPublisher>>,
}

impl FanoutEventPublisher {
    pub fn new(targets: Vec<Arc<dyn EventPublisher>>) -> Self {
        Self { targets }
    }

    pub fn push(&mut self, target: Arc<dyn EventPublisher>) {
        self.targets.push(target);
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[async_trait]
impl EventPublisher for FanoutEventPublisher {
    async fn publish_queue_update(&self, event: QueueUpdate) -> Result<()> {
        let mut first_error = None;
        for target in &self.targets {
            if let Err(e) = target.publish_queue_update(event).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn publish_match_found(&self, event: MatchFound) -> Result<()> {
        let mut first_error = None;
        for target in &self.targets {
            if let Err(e) = target.publish_match_found(event.clone()).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Mock event publisher for testing
#[derive(Debug, Default)]
pub struct MockEventPublisher {
    published_events: std::sync::Mutex<Vec<MatchmakingEvent>>,
    fail: std::sync::atomic::AtomicBool,
}

impl MockEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent publish fail (or succeed again)
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Get all published events (for testing)
    pub fn get_published_events(&self) -> Vec<MatchmakingEvent> {
        self.published_events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Published match announcements, in order
    pub fn match_found_events(&self) -> Vec<MatchFound> {
        self.get_published_events()
            .into_iter()
            .filter_map(|event| match event {
                MatchmakingEvent::MatchFound(found) => Some(found),
                MatchmakingEvent::QueueUpdate(_) => None,
            })
            .collect()
    }

    /// Published pool sizes, in order
    pub fn queue_totals(&self) -> Vec<u64> {
        self.get_published_events()
            .into_iter()
            .filter_map(|event| match event {
                MatchmakingEvent::QueueUpdate(update) => Some(update.total),
                MatchmakingEvent::MatchFound(_) => None,
            })
            .collect()
    }

    /// Clear published events (for testing)
    pub fn clear_events(&self) {
        if let Ok(mut events) = self.published_events.lock() {
            events.clear();
        }
    }

    fn record(&self, event: MatchmakingEvent) -> Result<()> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(MatchmakingError::Infrastructure {
                message: format!("mock publisher rejected {}", event.name()),
            }
            .into());
        }
        if let Ok(mut events) = self.published_events.lock() {
            events.push(event);
        }
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for MockEventPublisher {
    async fn publish_queue_update(&self, event: QueueUpdate) -> Result<()> {
        self.record(MatchmakingEvent::QueueUpdate(event))
    }

    async fn publish_match_found(&self, event: MatchFound) -> Result<()> {
        self.record(MatchmakingEvent::MatchFound(event))
    }
}
