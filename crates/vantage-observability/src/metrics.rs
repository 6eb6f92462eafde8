//! Metrics collection with Prometheus
//!
//! This module provides the Prometheus-backed [`MetricsSink`]:
//! - Context lifecycle counters (created, expired)
//! - Session lifecycle counters (started, ended)
//! - Sweep counter
//! - Context switch latency histogram

use std::sync::Arc;

use prometheus::{
    exponential_buckets, Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder,
};

use vantage_core::MetricsSink;

/// Metrics collector for the tenant context subsystem
#[derive(Clone)]
pub struct Metrics {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Context records created
    pub contexts_created: IntCounter,
    /// Context records evicted as expired
    pub contexts_expired: IntCounter,
    /// Sessions started
    pub sessions_started: IntCounter,
    /// Sessions ended
    pub sessions_ended: IntCounter,
    /// Expiry sweeps completed
    pub sweeps: IntCounter,
    /// Context switch latency in milliseconds
    pub switch_time_ms: Histogram,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let contexts_created = IntCounter::new(
            "vantage_contexts_created_total",
            "Total number of context records created",
        )?;
        let contexts_expired = IntCounter::new(
            "vantage_contexts_expired_total",
            "Total number of context records evicted as expired",
        )?;
        let sessions_started = IntCounter::new(
            "vantage_sessions_started_total",
            "Total number of sessions started",
        )?;
        let sessions_ended = IntCounter::new(
            "vantage_sessions_ended_total",
            "Total number of sessions ended",
        )?;
        let sweeps = IntCounter::new(
            "vantage_sweeps_total",
            "Total number of completed expiry sweeps",
        )?;

        // Buckets centered on the 5ms switch latency target
        let switch_time_ms = Histogram::with_opts(
            HistogramOpts::new(
                "vantage_switch_time_ms",
                "Context switch duration in milliseconds",
            )
            .buckets(exponential_buckets(0.25, 2.0, 12)?),
        )?;

        registry.register(Box::new(contexts_created.clone()))?;
        registry.register(Box::new(contexts_expired.clone()))?;
        registry.register(Box::new(sessions_started.clone()))?;
        registry.register(Box::new(sessions_ended.clone()))?;
        registry.register(Box::new(sweeps.clone()))?;
        registry.register(Box::new(switch_time_ms.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            contexts_created,
            contexts_expired,
            sessions_started,
            sessions_ended,
            sweeps,
            switch_time_ms,
        })
    }

    /// The underlying registry, for embedding into an exporter
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render all metrics in the Prometheus text exposition format
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl MetricsSink for Metrics {
    fn context_created(&self) {
        self.contexts_created.inc();
    }

    fn contexts_expired(&self, count: u64) {
        self.contexts_expired.inc_by(count);
    }

    fn session_started(&self) {
        self.sessions_started.inc();
    }

    fn session_ended(&self) {
        self.sessions_ended.inc();
    }

    fn sweep_completed(&self) {
        self.sweeps.inc();
    }

    fn observe_switch_time(&self, ms: f64) {
        self.switch_time_ms.observe(ms);
    }
}
