//! In-memory context record store with TTL semantics
//!
//! Records are keyed by opaque context IDs and indexed by scope. Expiration
//! is lazy: `get` and `list_by_scope` evict expired records as they are
//! encountered, and `sweep_expired` does a bulk pass. `get` additionally
//! triggers an amortized sweep once the configured interval has elapsed
//! since the last one, so a store that is only ever read still reclaims
//! expired entries.
//!
//! Concurrency: the primary map is sharded (dashmap), so operations on a
//! single context ID are linearized without a store-wide lock. The per-scope
//! index is a secondary structure that may briefly over-approximate while a
//! create/evict is in flight; readers re-validate every ID against the
//! primary map.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use vantage_core::{Clock, ContextScope, Error, MetricsSink, NoopMetrics, Result};

/// Default interval between amortized expiry sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// A single stored context entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextRecord {
    /// Opaque unique ID
    pub context_id: String,

    /// Lifetime/visibility class
    pub scope: ContextScope,

    /// Owning tenant; required for tenant scope
    pub tenant_id: Option<String>,

    /// Opaque payload
    pub data: HashMap<String, Value>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,

    /// Expiry instant; `None` never expires
    pub expires_at: Option<DateTime<Utc>>,

    /// Number of reads through `get`
    pub access_count: u64,
}

impl ContextRecord {
    /// A record is expired once `now` reaches `expires_at`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Keyed store of [`ContextRecord`] with TTL and scope-indexed lookup
pub struct ContextStore {
    records: DashMap<String, ContextRecord>,
    scope_index: HashMap<ContextScope, RwLock<HashSet<String>>>,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn MetricsSink>,
    sweep_interval: Duration,
    last_sweep: Mutex<DateTime<Utc>>,
    sweeping: AtomicBool,
}

impl ContextStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        let scope_index = ContextScope::ALL
            .into_iter()
            .map(|scope| (scope, RwLock::new(HashSet::new())))
            .collect();

        Self {
            records: DashMap::new(),
            scope_index,
            clock,
            metrics: Arc::new(NoopMetrics),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            last_sweep: Mutex::new(now),
            sweeping: AtomicBool::new(false),
        }
    }

    /// Attach a metrics sink
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Override the amortized sweep interval
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Create a new record
    ///
    /// Generates an ID when none is supplied. `ttl` of `None` (or zero)
    /// means the record never expires. Fails with `DuplicateContext` only
    /// when the ID collides with a live record; an expired record under the
    /// same ID is replaced.
    pub fn create(
        &self,
        scope: ContextScope,
        tenant_id: Option<String>,
        data: HashMap<String, Value>,
        ttl: Option<Duration>,
        context_id: Option<String>,
    ) -> Result<ContextRecord> {
        if scope == ContextScope::Tenant && tenant_id.is_none() {
            return Err(Error::InvalidIdentifier(
                "tenant-scoped context requires a tenant ID".to_string(),
            ));
        }

        let context_id = match context_id {
            Some(id) => id,
            None => Uuid::new_v4().simple().to_string(),
        };

        let now = self.clock.now();
        let expires_at = ttl
            .filter(|t| !t.is_zero())
            .and_then(|t| chrono::Duration::from_std(t).ok())
            .map(|t| now + t);

        let record = ContextRecord {
            context_id: context_id.clone(),
            scope,
            tenant_id,
            data,
            created_at: now,
            updated_at: now,
            last_accessed_at: now,
            expires_at,
            access_count: 0,
        };

        match self.records.entry(context_id.clone()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().is_expired(now) {
                    return Err(Error::DuplicateContext(context_id));
                }
                // Replacing an expired record: drop it from its old scope
                // index in case the scope changed.
                let old_scope = occupied.get().scope;
                occupied.insert(record.clone());
                if old_scope != scope {
                    self.index_remove(old_scope, &context_id);
                }
                self.metrics.contexts_expired(1);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(record.clone());
            }
        }

        self.index_insert(scope, &context_id);
        self.metrics.context_created();
        tracing::debug!(context_id = %context_id, scope = %scope, "Created context");

        Ok(record)
    }

    /// Look up a record by ID
    ///
    /// Expired records are evicted and reported as absent. A hit updates
    /// `last_accessed_at` and increments `access_count`.
    pub fn get(&self, context_id: &str) -> Option<ContextRecord> {
        self.maybe_sweep();

        let now = self.clock.now();
        let expired = match self.records.get_mut(context_id) {
            None => return None,
            Some(mut record) => {
                if record.is_expired(now) {
                    true
                } else {
                    record.last_accessed_at = now;
                    record.access_count += 1;
                    return Some(record.clone());
                }
            }
        };

        if expired {
            self.evict(context_id, now);
        }
        None
    }

    /// Update a record's data
    ///
    /// `merge` performs a shallow union (existing keys overwritten, new keys
    /// added); otherwise the data is replaced entirely. Fails with
    /// `NotFound` when the record is absent or expired.
    pub fn update(
        &self,
        context_id: &str,
        data: HashMap<String, Value>,
        merge: bool,
    ) -> Result<()> {
        let now = self.clock.now();
        let expired = match self.records.get_mut(context_id) {
            None => return Err(Error::NotFound(format!("context {}", context_id))),
            Some(mut record) => {
                if record.is_expired(now) {
                    true
                } else {
                    if merge {
                        record.data.extend(data);
                    } else {
                        record.data = data;
                    }
                    record.updated_at = now;
                    return Ok(());
                }
            }
        };

        if expired {
            self.evict(context_id, now);
        }
        Err(Error::NotFound(format!("context {}", context_id)))
    }

    /// Remove a record; idempotent
    ///
    /// Returns `false` when the ID was absent.
    pub fn delete(&self, context_id: &str) -> bool {
        match self.records.remove(context_id) {
            Some((_, record)) => {
                self.index_remove(record.scope, context_id);
                tracing::debug!(context_id = %context_id, "Deleted context");
                true
            }
            None => false,
        }
    }

    /// All live records in a scope
    ///
    /// Expired records encountered during the listing are evicted.
    pub fn list_by_scope(&self, scope: ContextScope) -> Vec<ContextRecord> {
        let ids: Vec<String> = {
            let index = self
                .scope_index
                .get(&scope)
                .expect("index exists for every scope")
                .read()
                .expect("scope index lock poisoned");
            index.iter().cloned().collect()
        };

        let now = self.clock.now();
        let mut live = Vec::new();
        let mut expired = Vec::new();

        for id in ids {
            match self.records.get(&id) {
                Some(record) if record.is_expired(now) => expired.push(id),
                Some(record) => live.push(record.value().clone()),
                // Stale index entry; the record was already removed.
                None => self.index_remove(scope, &id),
            }
        }

        for id in expired {
            self.evict(&id, now);
        }

        live
    }

    /// Bulk-evict every expired record
    ///
    /// Single-flight: a sweep already in progress causes this call to be a
    /// no-op returning 0. Expired IDs are collected first so that no shard
    /// lock is held while deletions run.
    pub fn sweep_expired(&self) -> usize {
        if self.sweeping.swap(true, Ordering::SeqCst) {
            tracing::debug!("Expiry sweep already in progress, skipping");
            return 0;
        }

        let now = self.clock.now();
        let expired: Vec<String> = self
            .records
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for id in &expired {
            if self.evict(id, now) {
                removed += 1;
            }
        }

        *self.last_sweep.lock().expect("sweep clock lock poisoned") = self.clock.now();
        self.metrics.sweep_completed();
        self.sweeping.store(false, Ordering::SeqCst);

        if removed > 0 {
            tracing::info!(removed, "Expiry sweep evicted contexts");
        }

        removed
    }

    /// Number of records currently held, including not-yet-evicted expired ones
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of live (non-expired) records in a scope
    pub fn count_by_scope(&self, scope: ContextScope) -> usize {
        let index = self
            .scope_index
            .get(&scope)
            .expect("index exists for every scope")
            .read()
            .expect("scope index lock poisoned");

        let now = self.clock.now();
        index
            .iter()
            .filter(|id| {
                self.records
                    .get(id.as_str())
                    .is_some_and(|r| !r.is_expired(now))
            })
            .count()
    }

    /// Run a sweep if the configured interval has elapsed since the last one
    fn maybe_sweep(&self) {
        let due = {
            let last = self.last_sweep.lock().expect("sweep clock lock poisoned");
            match (self.clock.now() - *last).to_std() {
                Ok(elapsed) => elapsed >= self.sweep_interval,
                Err(_) => false,
            }
        };

        if due {
            self.sweep_expired();
        }
    }

    /// Remove a record if it is still expired, plus its index entry
    ///
    /// The expiry re-check guards against racing a create that replaced the
    /// expired record under the same ID.
    fn evict(&self, context_id: &str, now: DateTime<Utc>) -> bool {
        let removed = self
            .records
            .remove_if(context_id, |_, record| record.is_expired(now));

        match removed {
            Some((_, record)) => {
                self.index_remove(record.scope, context_id);
                self.metrics.contexts_expired(1);
                tracing::debug!(context_id = %context_id, "Evicted expired context");
                true
            }
            None => false,
        }
    }

    fn index_insert(&self, scope: ContextScope, context_id: &str) {
        self.scope_index
            .get(&scope)
            .expect("index exists for every scope")
            .write()
            .expect("scope index lock poisoned")
            .insert(context_id.to_string());
    }

    fn index_remove(&self, scope: ContextScope, context_id: &str) {
        self.scope_index
            .get(&scope)
            .expect("index exists for every scope")
            .write()
            .expect("scope index lock poisoned")
            .remove(context_id);
    }
}
