//! Shared identifier aliases and classification enums

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Tenant identifier (caller-chosen, validated on creation)
pub type TenantId = String;

/// User identifier (typically an email address)
pub type UserId = String;

/// Session identifier (generated, 32 hex characters)
pub type SessionId = String;

/// Context record identifier
pub type ContextId = String;

/// Lifetime/visibility class of a context record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextScope {
    /// Bound to a single session
    Session,
    /// Bound to a single conversation
    Conversation,
    /// Visible across all tenants
    Global,
    /// Tenant-wide; requires an owning tenant
    Tenant,
    /// Analytics payloads (chart state, report context)
    Analytics,
    /// Navigation/UI state
    Navigation,
}

impl ContextScope {
    /// Every scope, in a stable order (used to build per-scope indexes)
    pub const ALL: [ContextScope; 6] = [
        ContextScope::Session,
        ContextScope::Conversation,
        ContextScope::Global,
        ContextScope::Tenant,
        ContextScope::Analytics,
        ContextScope::Navigation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContextScope::Session => "session",
            ContextScope::Conversation => "conversation",
            ContextScope::Global => "global",
            ContextScope::Tenant => "tenant",
            ContextScope::Analytics => "analytics",
            ContextScope::Navigation => "navigation",
        }
    }
}

impl fmt::Display for ContextScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ContextScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "session" => Ok(ContextScope::Session),
            "conversation" => Ok(ContextScope::Conversation),
            "global" => Ok(ContextScope::Global),
            "tenant" => Ok(ContextScope::Tenant),
            "analytics" => Ok(ContextScope::Analytics),
            "navigation" => Ok(ContextScope::Navigation),
            other => Err(Error::InvalidIdentifier(format!(
                "unknown context scope: {}",
                other
            ))),
        }
    }
}

/// Subscription tier of a tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantTier {
    Starter,
    Professional,
    Enterprise,
    Custom,
}

impl fmt::Display for TenantTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TenantTier::Starter => "starter",
            TenantTier::Professional => "professional",
            TenantTier::Enterprise => "enterprise",
            TenantTier::Custom => "custom",
        };
        write!(f, "{}", s)
    }
}

/// How strictly a tenant's data is partitioned from other tenants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    /// No data shared across tenants
    Strict,
    /// Aggregated analytics may be shared, raw data never
    SharedAnalytics,
    /// Federated deployments with cross-tenant visibility agreements
    Federated,
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IsolationLevel::Strict => "strict",
            IsolationLevel::SharedAnalytics => "shared_analytics",
            IsolationLevel::Federated => "federated",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_roundtrip() {
        for scope in ContextScope::ALL {
            let parsed: ContextScope = scope.as_str().parse().unwrap();
            assert_eq!(parsed, scope);
        }
    }

    #[test]
    fn test_scope_unknown_rejected() {
        let result: Result<ContextScope> = "chart".parse();
        assert!(matches!(result, Err(Error::InvalidIdentifier(_))));
    }

    #[test]
    fn test_scope_serde() {
        let json = serde_json::to_string(&ContextScope::Tenant).unwrap();
        assert_eq!(json, "\"tenant\"");

        let parsed: ContextScope = serde_json::from_str("\"analytics\"").unwrap();
        assert_eq!(parsed, ContextScope::Analytics);
    }

    #[test]
    fn test_tier_display() {
        assert_eq!(TenantTier::Professional.to_string(), "professional");
        assert_eq!(IsolationLevel::SharedAnalytics.to_string(), "shared_analytics");
    }
}
