//! Common test utilities for integration tests

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};

use vantage_core::{ManualClock, MetricsSink, TenantTier};
use vantage_registry::TenantRegistry;
use vantage_session::{ContextSwitchCoordinator, GarbageCollector, SessionManager};
use vantage_store::{ContextStore, MemoryStateStore};

/// Fully wired subsystem over a manual clock and in-memory state store
#[allow(dead_code)]
pub struct TestStack {
    pub clock: ManualClock,
    pub state: Arc<MemoryStateStore>,
    pub registry: Arc<TenantRegistry>,
    pub store: Arc<ContextStore>,
    pub sessions: Arc<SessionManager>,
    pub coordinator: ContextSwitchCoordinator,
    pub gc: GarbageCollector,
}

/// Build the stack with tenant `acme` (admin `alice@acme.com`) registered
#[allow(dead_code)]
pub async fn stack() -> TestStack {
    stack_with_metrics(None).await
}

/// Same as [`stack`], with an optional metrics sink wired into every component
#[allow(dead_code)]
pub async fn stack_with_metrics(metrics: Option<Arc<dyn MetricsSink>>) -> TestStack {
    vantage_observability::init_logging("info");

    let clock = ManualClock::starting_now();
    let state = Arc::new(MemoryStateStore::new());

    let registry = Arc::new(TenantRegistry::new(Arc::new(clock.clone())));
    registry
        .create_tenant(
            "acme",
            "Acme Corp",
            TenantTier::Professional,
            Some("alice@acme.com"),
        )
        .await
        .unwrap();

    let mut store = ContextStore::new(Arc::new(clock.clone()));
    let mut sessions = SessionManager::new(
        Arc::clone(&registry),
        Arc::clone(&state) as Arc<dyn vantage_store::StateStore>,
        Arc::new(clock.clone()),
    );
    if let Some(sink) = &metrics {
        store = store.with_metrics(Arc::clone(sink));
        sessions = sessions.with_metrics(Arc::clone(sink));
    }
    let store = Arc::new(store);
    let sessions = Arc::new(sessions);

    let mut coordinator = ContextSwitchCoordinator::new(
        Arc::clone(&registry),
        Arc::clone(&sessions),
        Arc::clone(&store),
    );
    if let Some(sink) = &metrics {
        coordinator = coordinator.with_metrics(Arc::clone(sink));
    }

    let gc = GarbageCollector::new(Arc::clone(&store), Arc::clone(&sessions));

    TestStack {
        clock,
        state,
        registry,
        store,
        sessions,
        coordinator,
        gc,
    }
}

/// Snapshot payload that scores 1.0 under default weights
#[allow(dead_code)]
pub fn full_snapshot() -> HashMap<String, Value> {
    HashMap::from([
        ("tenant_context".to_string(), json!({"tenant_id": "acme"})),
        (
            "turns".to_string(),
            json!([{"role": "user", "text": "quarterly planning"}]),
        ),
        ("participants".to_string(), json!(["alice@acme.com"])),
        ("topics".to_string(), json!(["planning", "budget"])),
    ])
}
