//! Metrics collection using Prometheus
//!
//! This module provides the counters, gauges and histograms exported by the
//! duel-room matchmaking service.

use crate::types::MatchResult;
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the matchmaking service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Pool and pairing metrics
    queue_metrics: QueueMetrics,

    /// Event channel metrics
    event_metrics: EventMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Pool and pairing metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Enrollment calls by outcome (waiting, matched, mock, invalid, error)
    pub enrollments_total: IntCounterVec,

    /// Matches formed by kind (real, mock)
    pub matches_formed_total: IntCounterVec,

    /// Stale or corrupt entries removed during pairing
    pub stale_entries_removed_total: IntCounter,

    /// Last observed pool size
    pub pool_size: IntGauge,
}

/// Event channel metrics
#[derive(Clone)]
pub struct EventMetrics {
    /// Events published by event name and status
    pub events_published_total: IntCounterVec,

    /// Publish durations by event name
    pub publish_duration: HistogramVec,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Full enroll call duration
    pub enroll_duration: Histogram,

    /// Store round-trip durations by operation
    pub store_operation_duration: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let queue_metrics = QueueMetrics::new(&registry)?;
        let event_metrics = EventMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            queue_metrics,
            event_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    pub fn events(&self) -> &EventMetrics {
        &self.event_metrics
    }

    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Record a completed enrollment
    pub fn record_enrollment(&self, result: &MatchResult, duration: Duration) {
        self.queue_metrics
            .enrollments_total
            .with_label_values(&[result.outcome()])
            .inc();

        if let MatchResult::Matched { is_mock, .. } = result {
            let kind = if *is_mock { "mock" } else { "real" };
            self.queue_metrics
                .matches_formed_total
                .with_label_values(&[kind])
                .inc();
        }

        self.performance_metrics
            .enroll_duration
            .observe(duration.as_secs_f64());
    }

    /// Record a rejected or failed enrollment
    pub fn record_enrollment_failure(&self, invalid_input: bool, duration: Duration) {
        let outcome = if invalid_input { "invalid" } else { "error" };
        self.queue_metrics
            .enrollments_total
            .with_label_values(&[outcome])
            .inc();

        self.performance_metrics
            .enroll_duration
            .observe(duration.as_secs_f64());
    }

    /// Record entries dropped by self-healing
    pub fn record_stale_removed(&self, count: usize) {
        self.queue_metrics
            .stale_entries_removed_total
            .inc_by(count as u64);
    }

    pub fn set_pool_size(&self, total: u64) {
        self.queue_metrics.pool_size.set(total as i64);
    }

    /// Record an event publish attempt
    pub fn record_event_published(&self, event: &str, success: bool, duration: Duration) {
        let status = if success { "success" } else { "error" };

        self.event_metrics
            .events_published_total
            .with_label_values(&[event, status])
            .inc();

        self.event_metrics
            .publish_duration
            .with_label_values(&[event])
            .observe(duration.as_secs_f64());
    }

    /// Record a store round trip
    pub fn record_store_operation(&self, operation: &str, duration: Duration) {
        self.performance_metrics
            .store_operation_duration
            .with_label_values(&[operation])
            .observe(duration.as_secs_f64());
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("duel_room_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "duel_room_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("duel_room_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
        })
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let enrollments_total = IntCounterVec::new(
            Opts::new("duel_room_enrollments_total", "Enrollment calls by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(enrollments_total.clone()))?;

        let matches_formed_total = IntCounterVec::new(
            Opts::new("duel_room_matches_formed_total", "Matches formed by kind"),
            &["kind"],
        )?;
        registry.register(Box::new(matches_formed_total.clone()))?;

        let stale_entries_removed_total = IntCounter::new(
            "duel_room_stale_entries_removed_total",
            "Stale or corrupt pool entries removed",
        )?;
        registry.register(Box::new(stale_entries_removed_total.clone()))?;

        let pool_size = IntGauge::new("duel_room_pool_size", "Players waiting in the pool")?;
        registry.register(Box::new(pool_size.clone()))?;

        Ok(Self {
            enrollments_total,
            matches_formed_total,
            stale_entries_removed_total,
            pool_size,
        })
    }
}

impl EventMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let events_published_total = IntCounterVec::new(
            Opts::new(
                "duel_room_events_published_total",
                "Matchmaking events published",
            ),
            &["event", "status"],
        )?;
        registry.register(Box::new(events_published_total.clone()))?;

        let publish_duration = HistogramVec::new(
            HistogramOpts::new(
                "duel_room_event_publish_duration_seconds",
                "Event publish duration",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["event"],
        )?;
        registry.register(Box::new(publish_duration.clone()))?;

        Ok(Self {
            events_published_total,
            publish_duration,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let enroll_duration = Histogram::with_opts(
            HistogramOpts::new(
                "duel_room_enroll_duration_seconds",
                "Enrollment processing time",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(enroll_duration.clone()))?;

        let store_operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "duel_room_store_operation_duration_seconds",
                "Store operation duration",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["operation"],
        )?;
        registry.register(Box::new(store_operation_duration.clone()))?;

        Ok(Self {
            enroll_duration,
            store_operation_duration,
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}
