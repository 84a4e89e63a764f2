//! Main application state and service coordination
//!
//! This module contains the production AppState that wires the queue store,
//! event publishers and coordinator together and runs the HTTP server and
//! background tasks.

use crate::api::{self, ApiState};
use crate::config::{AppConfig, StoreBackend};
use crate::events::{
    AmqpConfig, AmqpConnection, AmqpEventPublisher, BackgroundEventPublisher,
    BroadcastEventPublisher, EventPublisher, FanoutEventPublisher, PublisherConfig,
};
use crate::metrics::{HealthServer, HealthServerConfig, MetricsCollector};
use crate::queue::QueueCoordinator;
use crate::service::health::{HealthCheck, HealthStatus};
use crate::store::{MemoryQueueStore, QueueStore, RedisQueueStore, RedisStoreConfig};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Store connection error: {message}")]
    StoreConnection { message: String },

    #[error("AMQP connection error: {message}")]
    AmqpConnection { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Pool storage shared by every coordinator instance
    store: Arc<dyn QueueStore>,

    /// Core matchmaking component
    coordinator: QueueCoordinator,

    /// In-process bus feeding the event stream endpoint
    event_stream: BroadcastEventPublisher,

    /// AMQP connection, when the AMQP publisher is enabled
    amqp_connection: Option<Arc<AmqpConnection>>,

    metrics_collector: Arc<MetricsCollector>,

    /// Background task handles
    background_tasks: Mutex<Vec<JoinHandle<()>>>,

    /// Stops the HTTP server
    server_shutdown: Mutex<Option<broadcast::Sender<()>>>,

    /// Service status
    is_running: Arc<RwLock<bool>>,

    started_at: Instant,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Arc<Self>, ServiceError> {
        info!("Initializing duel-room matchmaking service");
        info!(
            "Configuration: service={}, store={:?}, amqp_enabled={}, mock_opponent={}",
            config.service.name,
            config.store.backend,
            config.events.amqp_enabled,
            config.matchmaking.enable_mock_opponent
        );

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let store = Self::initialize_store(&config).await?;

        let event_stream = BroadcastEventPublisher::new(config.events.broadcast_capacity);
        let amqp_connection = if config.events.amqp_enabled {
            Some(Self::initialize_amqp(&config).await?)
        } else {
            info!("AMQP publishing disabled - events go to the event stream only");
            None
        };

        let publisher =
            Self::initialize_publishers(&config, &event_stream, amqp_connection.as_deref())
                .await?;

        let fallback = config
            .fallback_policy()
            .map_err(|e| ServiceError::Configuration {
                message: format!("Invalid mock opponent roster: {}", e),
            })?;
        info!("Pairing fallback policy: {}", fallback.name());

        let coordinator =
            QueueCoordinator::with_metrics(store.clone(), publisher, metrics_collector.clone())
                .with_settings(config.queue_settings())
                .with_fallback(fallback);

        Ok(Arc::new(Self {
            config,
            store,
            coordinator,
            event_stream,
            amqp_connection,
            metrics_collector,
            background_tasks: Mutex::new(Vec::new()),
            server_shutdown: Mutex::new(None),
            is_running: Arc::new(RwLock::new(false)),
            started_at: Instant::now(),
        }))
    }

    /// Start the HTTP server and background tasks
    pub async fn start(self: &Arc<Self>) -> Result<(), ServiceError> {
        info!("Starting duel-room matchmaking service");

        // Mark as running
        self.set_running(true).await;

        self.start_http_server().await?;
        self.start_background_tasks().await?;

        info!("✅ Duel-room matchmaking service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of duel-room service");

        // Mark as not running
        self.set_running(false).await;

        if let Some(shutdown_tx) = self.server_shutdown.lock().await.take() {
            if shutdown_tx.send(()).is_err() {
                warn!("HTTP server was already stopped");
            } else {
                info!("✅ HTTP server stop signal sent");
            }
        }

        self.stop_background_tasks().await;

        let final_stats = self.coordinator.stats();
        info!("Final service statistics: {:?}", final_stats);
        info!("✅ Duel-room service shutdown completed");

        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub(crate) async fn set_running(&self, running: bool) {
        *self.is_running.write().await = running;
    }

    /// Get the queue coordinator
    pub fn coordinator(&self) -> QueueCoordinator {
        self.coordinator.clone()
    }

    pub fn store(&self) -> Arc<dyn QueueStore> {
        self.store.clone()
    }

    pub fn event_stream(&self) -> &BroadcastEventPublisher {
        &self.event_stream
    }

    /// Get AMQP connection for health checks
    pub fn amqp_connection(&self) -> Option<Arc<AmqpConnection>> {
        self.amqp_connection.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Router for the matchmaking endpoints
    pub fn api_router(&self) -> axum::Router {
        api::router(ApiState::new(
            self.coordinator.clone(),
            self.event_stream.clone(),
        ))
    }

    /// Connect the configured queue store
    async fn initialize_store(config: &AppConfig) -> Result<Arc<dyn QueueStore>, ServiceError> {
        match config.store.backend {
            StoreBackend::Memory => {
                info!("Using in-memory queue store (single instance only)");
                Ok(Arc::new(MemoryQueueStore::new()))
            }
            StoreBackend::Redis => {
                info!("Connecting to Redis: {}", config.store.redis_url);
                let redis_config = RedisStoreConfig {
                    url: config.store.redis_url.clone(),
                };
                let store = RedisQueueStore::connect(&redis_config).await.map_err(|e| {
                    ServiceError::StoreConnection {
                        message: format!("Failed to connect to Redis: {}", e),
                    }
                })?;
                Ok(Arc::new(store))
            }
        }
    }

    /// Initialize AMQP connection with retry logic
    async fn initialize_amqp(config: &AppConfig) -> Result<Arc<AmqpConnection>, ServiceError> {
        info!("Connecting to AMQP broker: {}", config.events.amqp_url);

        let mut amqp_config =
            AmqpConfig::from_url(&config.events.amqp_url).map_err(|e| {
                ServiceError::Configuration {
                    message: format!("Failed to parse AMQP URL: {}", e),
                }
            })?;
        amqp_config.max_retries = config.events.max_retry_attempts;
        amqp_config.retry_delay_ms = config.events.retry_delay_ms;

        let connection =
            AmqpConnection::new(amqp_config)
                .await
                .map_err(|e| ServiceError::AmqpConnection {
                    message: format!("Failed to connect to AMQP: {}", e),
                })?;

        Ok(Arc::new(connection))
    }

    /// Build the publisher the coordinator notifies
    async fn initialize_publishers(
        config: &AppConfig,
        event_stream: &BroadcastEventPublisher,
        amqp_connection: Option<&AmqpConnection>,
    ) -> Result<Arc<dyn EventPublisher>, ServiceError> {
        let targets: Vec<Arc<dyn EventPublisher>> = vec![Arc::new(event_stream.clone())];
        let mut fanout = FanoutEventPublisher::new(targets);

        if let Some(connection) = amqp_connection {
            let channel = connection.connection().open_channel(None).await.map_err(|e| {
                ServiceError::Initialization {
                    message: format!("Failed to open AMQP channel: {}", e),
                }
            })?;

            let publisher_config = PublisherConfig {
                exchange_name: config.events.exchange_name.clone(),
                max_retries: config.events.max_retry_attempts,
                retry_delay_ms: config.events.retry_delay_ms,
            };
            let publisher = AmqpEventPublisher::new(channel, publisher_config)
                .await
                .map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to initialize event publisher: {}", e),
                })?;
            // Broker retries run off the enrollment path
            fanout.push(Arc::new(BackgroundEventPublisher::spawn(
                Arc::new(publisher),
                config.events.publish_queue_capacity,
            )));
        }

        info!("Event publishers ready ({} targets)", fanout.len());
        Ok(Arc::new(fanout))
    }

    /// Spawn the HTTP server serving the API, health and metrics routes
    async fn start_http_server(self: &Arc<Self>) -> Result<(), ServiceError> {
        let server_config = HealthServerConfig {
            port: self.config.service.http_port,
            host: self.config.service.host.clone(),
        };
        let server = HealthServer::new(server_config, self.metrics_collector.clone())
            .with_app_state(self.clone())
            .with_routes(self.api_router());

        *self.server_shutdown.lock().await = Some(server.shutdown_handle());

        let server_handle = tokio::spawn(async move {
            if let Err(e) = server.start().await {
                error!("HTTP server failed: {}", e);
            } else {
                info!("HTTP server task completed");
            }
        });
        self.background_tasks.lock().await.push(server_handle);

        // Give the server a moment to start up
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        info!(
            "✅ HTTP server started on {}",
            self.config.bind_address()
        );
        Ok(())
    }

    /// Start background maintenance tasks
    async fn start_background_tasks(self: &Arc<Self>) -> Result<(), ServiceError> {
        info!("Starting background maintenance tasks...");

        // Pool size refresh task
        let refresh_interval = self.config.pool_refresh_interval();
        info!(
            "Starting pool size refresh task ({}s interval)...",
            refresh_interval.as_secs()
        );
        let pool_task = {
            let coordinator = self.coordinator.clone();
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(refresh_interval);
                info!("Pool size refresh task started");

                while *is_running.read().await {
                    interval.tick().await;

                    match coordinator.pool_size().await {
                        Ok(total) => debug!("Pool size refreshed - waiting: {}", total),
                        Err(e) => warn!("Failed to refresh pool size: {}", e),
                    }
                }

                info!("Pool size refresh task stopped");
            })
        };

        // Service health metrics task
        info!("Starting health metrics task (60s interval)...");
        let health_metrics_task = {
            let app_state = Arc::clone(self);

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(60));
                info!("Health metrics task started");

                while app_state.is_running().await {
                    interval.tick().await;

                    let metrics_collector = app_state.metrics();
                    let uptime_seconds = app_state.uptime().as_secs() as i64;
                    metrics_collector
                        .service()
                        .uptime_seconds
                        .set(uptime_seconds);

                    match HealthCheck::check(app_state.clone()).await {
                        Ok(health) => {
                            metrics_collector.update_health_status(health.status.as_gauge());
                            for check in &health.checks {
                                metrics_collector.update_component_health(
                                    &check.name,
                                    check.status != HealthStatus::Unhealthy,
                                );
                            }
                            debug!(
                                "Updated service health metrics - uptime: {}s, status: {}",
                                uptime_seconds, health.status
                            );
                        }
                        Err(e) => warn!("Health metrics update failed: {}", e),
                    }
                }

                info!("Health metrics task stopped");
            })
        };

        let mut tasks = self.background_tasks.lock().await;
        tasks.push(pool_task);
        tasks.push(health_metrics_task);

        info!("2 background maintenance tasks started successfully");
        Ok(())
    }

    /// Stop all background tasks
    async fn stop_background_tasks(&self) {
        let tasks: Vec<JoinHandle<()>> = self.background_tasks.lock().await.drain(..).collect();
        let task_count = tasks.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);

        for (i, task) in tasks.into_iter().enumerate() {
            debug!("Aborting background task {}/{}", i + 1, task_count);
            task.abort();
        }

        info!("✅ All {} background tasks stopped", task_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JoinRequest;

    #[tokio::test]
    async fn test_memory_backed_state_wires_coordinator() {
        let app_state = AppState::new(AppConfig::default()).await.unwrap();
        assert!(!app_state.is_running().await);
        assert!(app_state.amqp_connection().is_none());

        let mut events = app_state.event_stream().subscribe();
        let result = app_state
            .coordinator()
            .enroll(JoinRequest::new("0xa", None))
            .await
            .unwrap();

        assert!(result.is_waiting());
        assert!(events.recv().await.is_ok());
        assert_eq!(app_state.coordinator().stats().enrollments, 1);
    }

    #[tokio::test]
    async fn test_mock_opponent_from_config() {
        let mut config = AppConfig::default();
        config.matchmaking.enable_mock_opponent = true;

        let app_state = AppState::new(config).await.unwrap();
        assert!(app_state.coordinator().fallback().is_enabled());

        let result = app_state
            .coordinator()
            .enroll(JoinRequest::new("0xa", None))
            .await
            .unwrap();
        assert_eq!(result.outcome(), "mock");
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let mut config = AppConfig::default();
        config.service.host = "127.0.0.1".to_string();
        config.service.http_port = 38_471;

        let app_state = AppState::new(config).await.unwrap();
        app_state.start().await.unwrap();
        assert!(app_state.is_running().await);

        app_state.shutdown().await.unwrap();
        assert!(!app_state.is_running().await);
    }
}
