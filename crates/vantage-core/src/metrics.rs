//! Metrics sink abstraction
//!
//! Components take an injected [`MetricsSink`] instead of talking to a
//! metrics backend directly. The default [`NoopMetrics`] discards every
//! observation, so metrics are opt-in at construction time. Implementations
//! must be fire-and-forget: never block, never fail the caller.

/// Receiver for subsystem counters and timings
///
/// Every method has a no-op default so implementations only override the
/// families they record.
pub trait MetricsSink: Send + Sync {
    /// A context record was created
    fn context_created(&self) {}

    /// `count` context records were evicted as expired
    fn contexts_expired(&self, count: u64) {
        let _ = count;
    }

    /// A session was started
    fn session_started(&self) {}

    /// A session was ended (explicitly or by the idle sweep)
    fn session_ended(&self) {}

    /// An expiry sweep ran to completion
    fn sweep_completed(&self) {}

    /// Wall-clock duration of a context switch
    fn observe_switch_time(&self, ms: f64) {
        let _ = ms;
    }
}

/// Discards all observations
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {}
