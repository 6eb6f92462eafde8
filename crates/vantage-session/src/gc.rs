//! Garbage collection of expired contexts and idle sessions
//!
//! A sweep evicts expired context records and ends (never deletes) active
//! sessions whose last backup is older than the idle threshold. Sweeps are
//! single-flight: a trigger while one is in progress is a no-op.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::sleep;

use vantage_store::ContextStore;

use crate::config::GcConfig;
use crate::manager::SessionManager;

/// Outcome of a single sweep
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepStats {
    /// Context records evicted
    pub contexts_expired: usize,
    /// Idle sessions ended
    pub sessions_ended: usize,
    /// Duration of the sweep in milliseconds
    pub duration_ms: u64,
}

/// Reclaims expired state without blocking foreground operations
pub struct GarbageCollector {
    store: Arc<ContextStore>,
    sessions: Arc<SessionManager>,
    sweeping: AtomicBool,
}

impl GarbageCollector {
    pub fn new(store: Arc<ContextStore>, sessions: Arc<SessionManager>) -> Self {
        Self {
            store,
            sessions,
            sweeping: AtomicBool::new(false),
        }
    }

    /// Run one sweep
    ///
    /// Returns default (all-zero) stats without doing any work when a sweep
    /// is already in progress.
    pub async fn run_sweep(&self, idle_session_threshold: Duration) -> SweepStats {
        if self.sweeping.swap(true, Ordering::SeqCst) {
            tracing::debug!("Sweep already in progress, skipping");
            return SweepStats::default();
        }

        let start = Instant::now();
        let contexts_expired = self.store.sweep_expired();
        let sessions_ended = self.sessions.end_idle_sessions(idle_session_threshold).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        self.sweeping.store(false, Ordering::SeqCst);

        if contexts_expired > 0 || sessions_ended > 0 {
            tracing::info!(
                contexts_expired,
                sessions_ended,
                duration_ms,
                "Sweep completed"
            );
        }

        SweepStats {
            contexts_expired,
            sessions_ended,
            duration_ms,
        }
    }
}

/// Handle for the background sweep task
pub struct GcTask {
    shutdown_tx: tokio::sync::mpsc::Sender<()>,
}

impl GcTask {
    /// Signal the sweep task to shut down gracefully
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// Spawn a background task sweeping on a fixed interval
pub fn spawn_gc_task(gc: Arc<GarbageCollector>, config: GcConfig) -> GcTask {
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
    let interval = config.sweep_interval();
    let idle_threshold = config.idle_session_threshold();

    tokio::spawn(async move {
        tracing::info!(
            interval_secs = interval.as_secs(),
            "Starting garbage collection task"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Garbage collection task shutting down");
                    break;
                }
                _ = sleep(interval) => {
                    gc.run_sweep(idle_threshold).await;
                }
            }
        }
    });

    GcTask { shutdown_tx }
}
