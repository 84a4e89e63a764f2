//! Metrics and monitoring for the duel-room matchmaking service
//!
//! This module provides Prometheus metrics collection and the HTTP server that
//! exposes health checks and metrics.

pub mod collector;
pub mod health;

pub use collector::{
    EventMetrics, MetricsCollector, MetricsTimer, PerformanceMetrics, QueueMetrics,
    ServiceMetrics,
};
pub use health::{render_metrics, HealthServer, HealthServerConfig};
