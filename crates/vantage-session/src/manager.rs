//! Session tracking and crash-recoverable snapshotting
//!
//! Sessions live in memory and are persisted through the state store on
//! start, backup, and end, so a restarted process can hydrate the table and
//! offer the most recent good session for restoration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;

use vantage_core::{
    generate_secure_id, Clock, Error, MetricsSink, NoopMetrics, Result, SessionId,
};
use vantage_registry::TenantRegistry;
use vantage_store::StateStore;

use crate::quality::{score_snapshot, SnapshotWeights};
use crate::session::{Session, SessionSnapshot};

/// Key prefix for persisted sessions
const SESSION_KEY_PREFIX: &str = "session:";

/// Creates and tracks sessions for validated (tenant, user) pairs
pub struct SessionManager {
    sessions: DashMap<SessionId, Session>,
    registry: Arc<TenantRegistry>,
    state: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn MetricsSink>,
    weights: SnapshotWeights,
}

impl SessionManager {
    pub fn new(
        registry: Arc<TenantRegistry>,
        state: Arc<dyn StateStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            registry,
            state,
            clock,
            metrics: Arc::new(NoopMetrics),
            weights: SnapshotWeights::default(),
        }
    }

    /// Attach a metrics sink
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Override the snapshot scoring weights
    pub fn with_snapshot_weights(mut self, weights: SnapshotWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Hydrate sessions persisted by a previous process
    ///
    /// Returns the number of sessions loaded. In-memory sessions are never
    /// overwritten.
    pub async fn load_persisted(&self) -> Result<usize> {
        let keys = self
            .state
            .list_keys(SESSION_KEY_PREFIX)
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;

        let mut loaded = 0;
        for key in keys {
            let Some(bytes) = self
                .state
                .get(&key)
                .await
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?
            else {
                continue;
            };

            let session: Session = serde_json::from_slice(&bytes)?;
            if let dashmap::mapref::entry::Entry::Vacant(vacant) =
                self.sessions.entry(session.session_id.clone())
            {
                vacant.insert(session);
                loaded += 1;
            }
        }

        if loaded > 0 {
            tracing::info!(loaded, "Loaded persisted sessions");
        }
        Ok(loaded)
    }

    /// Start a new session for a validated (tenant, user) pair
    ///
    /// Fails with `AccessDenied` when the registry rejects the pair. The
    /// session is persisted before it becomes visible, so a failed start
    /// leaves no in-memory state.
    pub async fn start_session(&self, tenant_id: &str, user_id: &str) -> Result<Session> {
        if !self.registry.validate_access(tenant_id, user_id) {
            return Err(Error::AccessDenied(tenant_id.to_string()));
        }

        let session = Session::new(
            generate_secure_id(),
            tenant_id,
            user_id,
            self.clock.now(),
        );

        self.persist_session(&session).await?;
        self.sessions
            .insert(session.session_id.clone(), session.clone());

        self.metrics.session_started();
        tracing::info!(
            session_id = %session.session_id,
            tenant_id = %tenant_id,
            "Started session"
        );
        Ok(session)
    }

    /// Back up session-scoped context data
    ///
    /// Scores the snapshot, persists it, and updates `last_backup_at`.
    /// Returns the quality score. Fails with `NotFound` on an unknown or
    /// ended session and `StorageUnavailable` when persistence fails (the
    /// in-memory session is left unchanged in that case).
    pub async fn backup_session(
        &self,
        session_id: &str,
        snapshot_data: HashMap<String, Value>,
    ) -> Result<f64> {
        let now = self.clock.now();
        let score = score_snapshot(&snapshot_data, &self.weights);
        let snapshot = SessionSnapshot {
            data: snapshot_data,
            quality_score: score,
            captured_at: now,
        };

        let updated = {
            let session = self
                .sessions
                .get(session_id)
                .ok_or_else(|| Error::NotFound(format!("session {}", session_id)))?;
            if !session.is_active() {
                return Err(Error::NotFound(format!(
                    "session {} has ended",
                    session_id
                )));
            }

            let mut copy = session.clone();
            copy.snapshot = Some(snapshot.clone());
            copy.last_backup_at = now;
            copy
        };

        self.persist_session(&updated).await?;

        if let Some(mut session) = self.sessions.get_mut(session_id) {
            if session.is_active() {
                session.snapshot = Some(snapshot);
                session.last_backup_at = now;
            }
        }

        tracing::debug!(session_id = %session_id, quality = score, "Backed up session");
        Ok(score)
    }

    /// Heuristic for "was the process just restarted?"
    ///
    /// Returns the most recently backed-up active session whose last backup
    /// is fresher than `idle_threshold` and whose snapshot quality reaches
    /// `min_quality`.
    pub fn detect_restart(
        &self,
        idle_threshold: Duration,
        min_quality: f64,
    ) -> Option<Session> {
        let now = self.clock.now();

        self.sessions
            .iter()
            .filter(|entry| {
                let session = entry.value();
                session.is_active()
                    && session.quality_score().is_some_and(|q| q >= min_quality)
                    && within(now, session.last_backup_at, idle_threshold)
            })
            .max_by_key(|entry| entry.value().last_backup_at)
            .map(|entry| entry.value().clone())
    }

    /// Retrieve the snapshot data for a session
    ///
    /// Falls back to the persisted copy when the in-memory session is
    /// absent (crash recovery path).
    pub async fn restore_snapshot(
        &self,
        session_id: &str,
    ) -> Result<HashMap<String, Value>> {
        if let Some(session) = self.sessions.get(session_id) {
            if let Some(snapshot) = &session.snapshot {
                return Ok(snapshot.data.clone());
            }
        }

        let key = format!("{}{}", SESSION_KEY_PREFIX, session_id);
        let bytes = self
            .state
            .get(&key)
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?
            .ok_or_else(|| Error::NotFound(format!("session {}", session_id)))?;

        let session: Session = serde_json::from_slice(&bytes)?;
        session
            .snapshot
            .map(|s| s.data)
            .ok_or_else(|| Error::NotFound(format!("no snapshot for session {}", session_id)))
    }

    /// End a session
    ///
    /// Idempotent: ending an already-ended session is a no-op. Fails with
    /// `NotFound` only for unknown sessions. Persistence of the terminal
    /// state is best-effort; a storage failure is logged, not raised, since
    /// the in-memory transition has already happened.
    pub async fn end_session(&self, session_id: &str) -> Result<()> {
        let updated = {
            let mut session = self
                .sessions
                .get_mut(session_id)
                .ok_or_else(|| Error::NotFound(format!("session {}", session_id)))?;
            if session.ended_at.is_some() {
                return Ok(());
            }
            session.ended_at = Some(self.clock.now());
            session.clone()
        };

        self.metrics.session_ended();
        tracing::info!(session_id = %session_id, "Ended session");

        if let Err(e) = self.persist_session(&updated).await {
            tracing::warn!(
                session_id = %session_id,
                error = %e,
                "Failed to persist ended session"
            );
        }
        Ok(())
    }

    /// End every active session whose last backup is older than `threshold`
    ///
    /// Used by the garbage collector. Individual failures are logged and
    /// skipped so one bad session cannot halt the sweep. Returns the number
    /// of sessions ended.
    pub async fn end_idle_sessions(&self, threshold: Duration) -> usize {
        let now = self.clock.now();
        let idle: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|entry| {
                let session = entry.value();
                session.is_active() && !within(now, session.last_backup_at, threshold)
            })
            .map(|entry| entry.key().clone())
            .collect();

        let mut ended = 0;
        for session_id in idle {
            match self.end_session(&session_id).await {
                Ok(()) => ended += 1,
                Err(e) => {
                    tracing::warn!(
                        session_id = %session_id,
                        error = %e,
                        "Failed to end idle session"
                    );
                }
            }
        }
        ended
    }

    /// Look up a session by ID
    pub fn get_session(&self, session_id: &str) -> Option<Session> {
        self.sessions.get(session_id).map(|s| s.value().clone())
    }

    /// Number of tracked sessions, ended ones included
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of active sessions
    pub fn active_session_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|entry| entry.value().is_active())
            .count()
    }

    async fn persist_session(&self, session: &Session) -> Result<()> {
        let key = format!("{}{}", SESSION_KEY_PREFIX, session.session_id);
        let bytes = serde_json::to_vec(session)?;
        self.state
            .put(&key, bytes)
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))
    }
}

/// Whether `instant` is within `threshold` of `now`
fn within(now: DateTime<Utc>, instant: DateTime<Utc>, threshold: Duration) -> bool {
    match (now - instant).to_std() {
        Ok(elapsed) => elapsed < threshold,
        // Instant in the future (clock skew): treat as fresh
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::{KEY_PARTICIPANTS, KEY_TENANT_CONTEXT, KEY_TOPICS, KEY_TURNS};
    use serde_json::json;
    use vantage_core::{ManualClock, TenantTier};
    use vantage_store::MemoryStateStore;

    async fn setup() -> (Arc<TenantRegistry>, Arc<MemoryStateStore>, ManualClock) {
        let clock = ManualClock::starting_now();
        let registry = Arc::new(TenantRegistry::new(Arc::new(clock.clone())));
        registry
            .create_tenant("acme", "Acme", TenantTier::Professional, Some("alice@acme.com"))
            .await
            .unwrap();
        let state = Arc::new(MemoryStateStore::new());
        (registry, state, clock)
    }

    fn manager(
        registry: Arc<TenantRegistry>,
        state: Arc<MemoryStateStore>,
        clock: ManualClock,
    ) -> SessionManager {
        SessionManager::new(registry, state, Arc::new(clock))
    }

    fn full_snapshot() -> HashMap<String, Value> {
        HashMap::from([
            (KEY_TENANT_CONTEXT.to_string(), json!({"tenant_id": "acme"})),
            (KEY_TURNS.to_string(), json!([{"role": "user"}])),
            (KEY_PARTICIPANTS.to_string(), json!(["alice@acme.com"])),
            (KEY_TOPICS.to_string(), json!(["planning"])),
        ])
    }

    #[tokio::test]
    async fn test_start_session_requires_access() {
        let (registry, state, clock) = setup().await;
        let manager = manager(registry, state, clock);

        let session = manager.start_session("acme", "alice@acme.com").await.unwrap();
        assert!(session.is_active());
        assert_eq!(session.tenant_id, "acme");

        let denied = manager.start_session("acme", "bob@other.com").await;
        assert!(matches!(denied, Err(Error::AccessDenied(_))));
        assert_eq!(manager.session_count(), 1);
    }

    #[tokio::test]
    async fn test_backup_updates_score_and_timestamp() {
        let (registry, state, clock) = setup().await;
        let manager = manager(registry, state, clock.clone());
        let session = manager.start_session("acme", "alice@acme.com").await.unwrap();

        clock.advance(chrono::Duration::seconds(10));
        let score = manager
            .backup_session(&session.session_id, full_snapshot())
            .await
            .unwrap();
        assert!((score - 1.0).abs() < f64::EPSILON);

        let stored = manager.get_session(&session.session_id).unwrap();
        assert_eq!(stored.quality_score(), Some(score));
        assert_eq!(
            stored.last_backup_at - session.started_at,
            chrono::Duration::seconds(10)
        );
    }

    #[tokio::test]
    async fn test_backup_unknown_or_ended_session_fails() {
        let (registry, state, clock) = setup().await;
        let manager = manager(registry, state, clock);

        let result = manager.backup_session("ghost", HashMap::new()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));

        let session = manager.start_session("acme", "alice@acme.com").await.unwrap();
        manager.end_session(&session.session_id).await.unwrap();

        let result = manager
            .backup_session(&session.session_id, HashMap::new())
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_end_session_idempotent() {
        let (registry, state, clock) = setup().await;
        let manager = manager(registry, state, clock);
        let session = manager.start_session("acme", "alice@acme.com").await.unwrap();

        manager.end_session(&session.session_id).await.unwrap();
        let ended_at = manager.get_session(&session.session_id).unwrap().ended_at;
        assert!(ended_at.is_some());

        // Second end is a no-op, not an error, and the timestamp is unchanged
        manager.end_session(&session.session_id).await.unwrap();
        assert_eq!(
            manager.get_session(&session.session_id).unwrap().ended_at,
            ended_at
        );

        let unknown = manager.end_session("ghost").await;
        assert!(matches!(unknown, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_detect_restart_prefers_most_recent_good_backup() {
        let (registry, state, clock) = setup().await;
        let manager = manager(registry, state, clock.clone());

        let old = manager.start_session("acme", "alice@acme.com").await.unwrap();
        manager
            .backup_session(&old.session_id, full_snapshot())
            .await
            .unwrap();

        clock.advance(chrono::Duration::seconds(60));
        let recent = manager.start_session("acme", "alice@acme.com").await.unwrap();
        manager
            .backup_session(&recent.session_id, full_snapshot())
            .await
            .unwrap();

        let detected = manager
            .detect_restart(Duration::from_secs(300), 0.5)
            .unwrap();
        assert_eq!(detected.session_id, recent.session_id);
    }

    #[tokio::test]
    async fn test_detect_restart_honors_thresholds() {
        let (registry, state, clock) = setup().await;
        let manager = manager(registry, state, clock.clone());

        let session = manager.start_session("acme", "alice@acme.com").await.unwrap();
        // Low-quality snapshot: only topics present
        manager
            .backup_session(
                &session.session_id,
                HashMap::from([(KEY_TOPICS.to_string(), json!(["x"]))]),
            )
            .await
            .unwrap();

        assert!(manager.detect_restart(Duration::from_secs(300), 0.5).is_none());
        assert!(manager.detect_restart(Duration::from_secs(300), 0.2).is_some());

        // Stale backup falls outside the idle window
        clock.advance(chrono::Duration::seconds(600));
        assert!(manager.detect_restart(Duration::from_secs(300), 0.2).is_none());
    }

    #[tokio::test]
    async fn test_detect_restart_ignores_ended_sessions() {
        let (registry, state, clock) = setup().await;
        let manager = manager(registry, state, clock);

        let session = manager.start_session("acme", "alice@acme.com").await.unwrap();
        manager
            .backup_session(&session.session_id, full_snapshot())
            .await
            .unwrap();
        manager.end_session(&session.session_id).await.unwrap();

        assert!(manager.detect_restart(Duration::from_secs(300), 0.5).is_none());
    }

    #[tokio::test]
    async fn test_restore_snapshot_survives_restart() {
        let (registry, state, clock) = setup().await;

        let session_id = {
            let manager = manager(
                Arc::clone(&registry),
                Arc::clone(&state),
                clock.clone(),
            );
            let session = manager.start_session("acme", "alice@acme.com").await.unwrap();
            manager
                .backup_session(&session.session_id, full_snapshot())
                .await
                .unwrap();
            session.session_id
        };

        // Fresh manager over the same state store simulates a restart
        let restarted = manager(registry, state, clock);
        assert_eq!(restarted.session_count(), 0);

        let data = restarted.restore_snapshot(&session_id).await.unwrap();
        assert_eq!(data[KEY_TOPICS], json!(["planning"]));

        // Hydration brings the session table back too
        assert_eq!(restarted.load_persisted().await.unwrap(), 1);
        assert!(restarted
            .detect_restart(Duration::from_secs(300), 0.5)
            .is_some());
    }

    #[tokio::test]
    async fn test_restore_snapshot_not_found() {
        let (registry, state, clock) = setup().await;
        let manager = manager(registry, state, clock);

        let result = manager.restore_snapshot("ghost").await;
        assert!(matches!(result, Err(Error::NotFound(_))));

        // Session without any backup has no snapshot to restore
        let session = manager.start_session("acme", "alice@acme.com").await.unwrap();
        let result = manager.restore_snapshot(&session.session_id).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_end_idle_sessions() {
        let (registry, state, clock) = setup().await;
        let manager = manager(registry, state, clock.clone());

        let idle = manager.start_session("acme", "alice@acme.com").await.unwrap();
        clock.advance(chrono::Duration::seconds(120));
        let fresh = manager.start_session("acme", "alice@acme.com").await.unwrap();

        let ended = manager.end_idle_sessions(Duration::from_secs(60)).await;
        assert_eq!(ended, 1);
        assert!(!manager.get_session(&idle.session_id).unwrap().is_active());
        assert!(manager.get_session(&fresh.session_id).unwrap().is_active());
        assert_eq!(manager.active_session_count(), 1);
    }
}
