//! Tenant profiles and access validation
//!
//! Query operations (`get_tenant`, `validate_access`) never fail on a lookup
//! miss; they return `None`/`false`. Mutating operations return typed errors
//! for caller-correctable conditions (duplicate ID, malformed ID) and
//! propagate storage failures when a state store is attached.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use vantage_core::{
    validate_identifier, Clock, Error, IsolationLevel, Result, TenantTier,
};
use vantage_store::StateStore;

/// Key prefix for persisted profiles
const PROFILE_KEY_PREFIX: &str = "tenant_profile:";

/// An isolated organizational unit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TenantProfile {
    /// Unique ID, immutable after creation
    pub tenant_id: String,

    /// Human-readable name
    pub name: String,

    pub tier: TenantTier,
    pub isolation_level: IsolationLevel,

    /// Users with unconditional access
    pub admin_users: HashSet<String>,

    /// Email domains whose users may access the tenant
    pub allowed_domains: HashSet<String>,

    /// Deactivated tenants reject all context switches but keep their data
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

/// Registry of tenant profiles with access validation
pub struct TenantRegistry {
    tenants: DashMap<String, TenantProfile>,
    state: Option<Arc<dyn StateStore>>,
    clock: Arc<dyn Clock>,
}

impl TenantRegistry {
    /// Registry without durability
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            tenants: DashMap::new(),
            state: None,
            clock,
        }
    }

    /// Registry persisting profiles through the given state store
    pub fn with_state_store(clock: Arc<dyn Clock>, state: Arc<dyn StateStore>) -> Self {
        Self {
            tenants: DashMap::new(),
            state: Some(state),
            clock,
        }
    }

    /// Hydrate profiles persisted by a previous process
    ///
    /// Returns the number of profiles loaded. Profiles already present in
    /// memory are left untouched.
    pub async fn load_persisted(&self) -> Result<usize> {
        let Some(state) = &self.state else {
            return Ok(0);
        };

        let keys = state
            .list_keys(PROFILE_KEY_PREFIX)
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;

        let mut loaded = 0;
        for key in keys {
            let Some(bytes) = state
                .get(&key)
                .await
                .map_err(|e| Error::StorageUnavailable(e.to_string()))?
            else {
                continue;
            };

            let profile: TenantProfile = serde_json::from_slice(&bytes)?;
            if let Entry::Vacant(vacant) = self.tenants.entry(profile.tenant_id.clone()) {
                vacant.insert(profile);
                loaded += 1;
            }
        }

        if loaded > 0 {
            tracing::info!(loaded, "Loaded persisted tenant profiles");
        }
        Ok(loaded)
    }

    /// Create a new tenant
    ///
    /// Fails with `InvalidIdentifier` on a malformed ID and
    /// `DuplicateTenant` when the ID is taken.
    pub async fn create_tenant(
        &self,
        tenant_id: &str,
        name: &str,
        tier: TenantTier,
        admin_user: Option<&str>,
    ) -> Result<TenantProfile> {
        validate_identifier(tenant_id)?;

        let now = self.clock.now();
        let mut admin_users = HashSet::new();
        if let Some(admin) = admin_user {
            admin_users.insert(admin.to_string());
        }

        let profile = TenantProfile {
            tenant_id: tenant_id.to_string(),
            name: name.to_string(),
            tier,
            isolation_level: IsolationLevel::Strict,
            admin_users,
            allowed_domains: HashSet::new(),
            is_active: true,
            created_at: now,
            last_accessed_at: now,
        };

        match self.tenants.entry(tenant_id.to_string()) {
            Entry::Occupied(_) => {
                return Err(Error::DuplicateTenant(tenant_id.to_string()));
            }
            Entry::Vacant(vacant) => {
                vacant.insert(profile.clone());
            }
        }

        if let Err(e) = self.persist_profile(&profile).await {
            // Undo the in-memory insert so a failed create leaves no state
            self.tenants.remove(tenant_id);
            return Err(e);
        }

        tracing::info!(tenant_id = %tenant_id, tier = %tier, "Created tenant");
        Ok(profile)
    }

    /// Look up a tenant profile
    pub fn get_tenant(&self, tenant_id: &str) -> Option<TenantProfile> {
        self.tenants.get(tenant_id).map(|t| t.value().clone())
    }

    /// Soft-delete a tenant: it rejects all access but its data is kept
    pub async fn deactivate_tenant(&self, tenant_id: &str) -> Result<()> {
        let profile = {
            let mut tenant = self
                .tenants
                .get_mut(tenant_id)
                .ok_or_else(|| Error::NotFound(format!("tenant {}", tenant_id)))?;
            tenant.is_active = false;
            tenant.clone()
        };

        self.persist_profile(&profile).await?;
        tracing::info!(tenant_id = %tenant_id, "Deactivated tenant");
        Ok(())
    }

    /// Grant a user unconditional access
    pub async fn add_admin(&self, tenant_id: &str, user_id: &str) -> Result<()> {
        self.mutate_profile(tenant_id, |profile| {
            profile.admin_users.insert(user_id.to_string());
        })
        .await
    }

    /// Allow all users whose email domain matches
    pub async fn allow_domain(&self, tenant_id: &str, domain: &str) -> Result<()> {
        self.mutate_profile(tenant_id, |profile| {
            profile.allowed_domains.insert(domain.to_string());
        })
        .await
    }

    /// Change the tenant's isolation level
    pub async fn set_isolation_level(
        &self,
        tenant_id: &str,
        level: IsolationLevel,
    ) -> Result<()> {
        self.mutate_profile(tenant_id, |profile| {
            profile.isolation_level = level;
        })
        .await
    }

    /// Whether `user_id` may access the tenant
    ///
    /// True iff the tenant exists, is active, and the user is an admin or
    /// their email domain (text after the last `@`) is allowed. With no
    /// allowed domains configured, only admins pass.
    pub fn validate_access(&self, tenant_id: &str, user_id: &str) -> bool {
        let Some(mut tenant) = self.tenants.get_mut(tenant_id) else {
            return false;
        };
        if !tenant.is_active {
            return false;
        }

        let allowed = tenant.admin_users.contains(user_id)
            || domain_of(user_id)
                .map(|domain| tenant.allowed_domains.contains(domain))
                .unwrap_or(false);

        if allowed {
            tenant.last_accessed_at = self.clock.now();
        }
        allowed
    }

    /// Whether `user_id` is an admin of an active tenant
    pub fn validate_admin_access(&self, tenant_id: &str, user_id: &str) -> bool {
        self.tenants
            .get(tenant_id)
            .map(|t| t.is_active && t.admin_users.contains(user_id))
            .unwrap_or(false)
    }

    /// Number of registered tenants (active and deactivated)
    pub fn tenant_count(&self) -> usize {
        self.tenants.len()
    }

    async fn mutate_profile<F>(&self, tenant_id: &str, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut TenantProfile),
    {
        let profile = {
            let mut tenant = self
                .tenants
                .get_mut(tenant_id)
                .ok_or_else(|| Error::NotFound(format!("tenant {}", tenant_id)))?;
            mutate(&mut tenant);
            tenant.clone()
        };

        self.persist_profile(&profile).await
    }

    async fn persist_profile(&self, profile: &TenantProfile) -> Result<()> {
        let Some(state) = &self.state else {
            return Ok(());
        };

        let key = format!("{}{}", PROFILE_KEY_PREFIX, profile.tenant_id);
        let bytes = serde_json::to_vec(profile)?;
        state
            .put(&key, bytes)
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))
    }
}

/// Email domain: the text after the last `@`, if any
fn domain_of(user_id: &str) -> Option<&str> {
    user_id.rsplit_once('@').map(|(_, domain)| domain)
}
