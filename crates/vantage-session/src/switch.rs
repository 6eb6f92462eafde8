//! Context switch coordination
//!
//! `switch_context` is the single entry point tying the tenant registry,
//! session manager, and context store together: it validates access, resumes
//! or starts a session, and establishes the session's context record under
//! the tenant namespace. Validation happens before any state is created, so
//! a failed switch leaves nothing behind.
//!
//! Namespaces are pure functions of the tenant ID: two concurrent switches
//! for the same tenant always compute identical namespace strings.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::{json, Value};

use vantage_core::{ContextScope, Error, MetricsSink, NoopMetrics, Result};
use vantage_registry::TenantRegistry;
use vantage_store::ContextStore;

use crate::config::CoordinatorConfig;
use crate::manager::SessionManager;
use crate::session::Session;

/// Namespace for a tenant's context records
pub fn context_namespace(tenant_id: &str) -> String {
    format!("tenant:{}:context", tenant_id)
}

/// Namespace for a tenant's cache entries
pub fn cache_namespace(tenant_id: &str) -> String {
    format!("tenant:{}:cache", tenant_id)
}

/// An established, validated tenant/session context
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TenantContextHandle {
    pub tenant_id: String,
    pub user_id: String,
    pub session_id: String,

    /// Key prefix for the tenant's context records
    pub context_namespace: String,

    /// Key prefix for the tenant's cache entries
    pub cache_namespace: String,

    /// Wall-clock duration of the switch
    pub switch_time_ms: f64,
}

impl TenantContextHandle {
    /// Storage key of the session's context record within the tenant namespace
    pub fn session_context_key(&self) -> String {
        format!("{}:{}", self.context_namespace, self.session_id)
    }
}

/// Coordinates access validation, session resolution, and context setup
pub struct ContextSwitchCoordinator {
    registry: Arc<TenantRegistry>,
    sessions: Arc<SessionManager>,
    store: Arc<ContextStore>,
    metrics: Arc<dyn MetricsSink>,
    config: CoordinatorConfig,
}

impl ContextSwitchCoordinator {
    pub fn new(
        registry: Arc<TenantRegistry>,
        sessions: Arc<SessionManager>,
        store: Arc<ContextStore>,
    ) -> Self {
        Self {
            registry,
            sessions,
            store,
            metrics: Arc::new(NoopMetrics),
            config: CoordinatorConfig::default(),
        }
    }

    /// Attach a metrics sink
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Override the coordinator configuration
    pub fn with_config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Establish a validated tenant/session context
    ///
    /// With a `session_id`, the existing session is resumed (`NotFound` if
    /// absent, ended, or belonging to a different tenant); otherwise a new
    /// session is started. Fails with `AccessDenied` before any state is
    /// created when the registry rejects the (tenant, user) pair.
    pub async fn switch_context(
        &self,
        tenant_id: &str,
        user_id: &str,
        session_id: Option<&str>,
    ) -> Result<TenantContextHandle> {
        let start = Instant::now();

        if !self.registry.validate_access(tenant_id, user_id) {
            return Err(Error::AccessDenied(tenant_id.to_string()));
        }

        let session = self.resolve_session(tenant_id, user_id, session_id).await?;

        let context_namespace = context_namespace(tenant_id);
        let cache_namespace = cache_namespace(tenant_id);
        let context_key = format!("{}:{}", context_namespace, session.session_id);

        if self.store.get(&context_key).is_none() {
            let data: HashMap<String, Value> = HashMap::from([
                ("tenant_id".to_string(), json!(tenant_id)),
                ("user_id".to_string(), json!(user_id)),
            ]);

            match self.store.create(
                ContextScope::Session,
                Some(tenant_id.to_string()),
                data,
                self.config.context_ttl(),
                Some(context_key.clone()),
            ) {
                Ok(_) => {}
                // A concurrent switch for the same session established it first
                Err(Error::DuplicateContext(_)) => {}
                Err(e) => return Err(e),
            }
        }

        let switch_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        self.metrics.observe_switch_time(switch_time_ms);
        if switch_time_ms > self.config.switch_target_ms {
            tracing::warn!(
                tenant_id = %tenant_id,
                switch_time_ms,
                target_ms = self.config.switch_target_ms,
                "Context switch exceeded latency target"
            );
        } else {
            tracing::debug!(
                tenant_id = %tenant_id,
                session_id = %session.session_id,
                switch_time_ms,
                "Context switch complete"
            );
        }

        Ok(TenantContextHandle {
            tenant_id: tenant_id.to_string(),
            user_id: user_id.to_string(),
            session_id: session.session_id,
            context_namespace,
            cache_namespace,
            switch_time_ms,
        })
    }

    /// [`switch_context`](Self::switch_context) with a caller-supplied timeout
    ///
    /// The handle is only returned once every step has succeeded, so a
    /// timeout never exposes a partially-built context.
    pub async fn switch_context_with_timeout(
        &self,
        tenant_id: &str,
        user_id: &str,
        session_id: Option<&str>,
        timeout: Duration,
    ) -> Result<TenantContextHandle> {
        match tokio::time::timeout(
            timeout,
            self.switch_context(tenant_id, user_id, session_id),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(timeout.as_millis() as u64)),
        }
    }

    async fn resolve_session(
        &self,
        tenant_id: &str,
        user_id: &str,
        session_id: Option<&str>,
    ) -> Result<Session> {
        match session_id {
            Some(id) => {
                let session = self
                    .sessions
                    .get_session(id)
                    .ok_or_else(|| Error::NotFound(format!("session {}", id)))?;
                if !session.is_active() {
                    return Err(Error::NotFound(format!("session {} has ended", id)));
                }
                // A session from another tenant reads as absent rather than
                // leaking its existence
                if session.tenant_id != tenant_id {
                    return Err(Error::NotFound(format!("session {}", id)));
                }
                Ok(session)
            }
            None => self.sessions.start_session(tenant_id, user_id).await,
        }
    }
}
