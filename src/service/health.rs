//! Health check endpoints and monitoring
//!
//! This module provides health check functionality for the duel-room
//! matchmaking service, including readiness and liveness checks.

use crate::service::app::AppState;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Gauge value used by the health metric
    pub fn as_gauge(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }

    fn worst(self, other: &HealthStatus) -> HealthStatus {
        match (&self, other) {
            (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
            (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => HealthStatus::Degraded,
            _ => HealthStatus::Healthy,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Service version
    pub version: String,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional error message if unhealthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Players currently in the pool, if the store answered
    pub pool_size: Option<u64>,
    /// Enrollments accepted since start
    pub enrollments: u64,
    /// Real matches formed since start
    pub matches_formed: u64,
    /// Mock matches handed out since start
    pub mock_matches: u64,
    /// Stale entries removed since start
    pub stale_removed: u64,
    /// Connected event-stream clients
    pub event_subscribers: usize,
    /// Service uptime in seconds
    pub uptime_seconds: u64,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(app_state: Arc<AppState>) -> Result<Self> {
        let mut checks = Vec::new();

        checks.push(Self::check_service_running(&app_state).await);
        checks.push(Self::check_store(&app_state).await);
        if let Some(amqp_check) = Self::check_amqp_health(&app_state) {
            checks.push(amqp_check);
        }

        let overall_status = checks
            .iter()
            .fold(HealthStatus::Healthy, |status, check| {
                status.worst(&check.status)
            });

        let stats = Self::gather_service_stats(&app_state).await;

        Ok(HealthCheck {
            status: overall_status,
            service: app_state.config().service.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats,
        })
    }

    /// Simple liveness check - just verify service is running
    pub async fn liveness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if app_state.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - verify service can handle requests
    pub async fn readiness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        // Service must be running
        if !app_state.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        Self::dependencies_check(app_state).await
    }

    /// Check the store and AMQP link, regardless of whether the service runs
    pub async fn dependencies_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        let store = Self::check_store(&app_state).await.status;
        let amqp = Self::check_amqp_health(&app_state)
            .map(|check| check.status)
            .unwrap_or(HealthStatus::Healthy);

        // A broken AMQP link only degrades: the store and event stream still work
        let amqp = match amqp {
            HealthStatus::Unhealthy => HealthStatus::Degraded,
            other => other,
        };
        Ok(store.worst(&amqp))
    }

    /// Check if service is running
    async fn check_service_running(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = if app_state.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Ping the queue store
    async fn check_store(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = match app_state.store().ping().await {
            Ok(()) => (HealthStatus::Healthy, None),
            Err(e) => {
                error!("Queue store ping failed: {}", e);
                (
                    HealthStatus::Unhealthy,
                    Some(format!("Store unreachable: {}", e)),
                )
            }
        };

        ComponentCheck {
            name: "queue_store".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Check the AMQP connection, if one is configured
    fn check_amqp_health(app_state: &AppState) -> Option<ComponentCheck> {
        let connection = app_state.amqp_connection()?;
        let start = std::time::Instant::now();

        let (status, message) = if connection.is_alive() {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("AMQP connection is closed".to_string()),
            )
        };

        Some(ComponentCheck {
            name: "amqp_connection".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Gather current service statistics
    async fn gather_service_stats(app_state: &AppState) -> ServiceStats {
        let coordinator = app_state.coordinator();
        let counters = coordinator.stats();

        let pool_size = match coordinator.pool_size().await {
            Ok(total) => Some(total),
            Err(e) => {
                debug!("Failed to read pool size for health check: {}", e);
                None
            }
        };

        ServiceStats {
            pool_size,
            enrollments: counters.enrollments,
            matches_formed: counters.matches_formed,
            mock_matches: counters.mock_matches,
            stale_removed: counters.stale_removed,
            event_subscribers: app_state.event_stream().receiver_count(),
            uptime_seconds: app_state.uptime().as_secs(),
        }
    }
}

/// Convert health check to JSON string
impl HealthCheck {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}
