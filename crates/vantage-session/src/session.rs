//! Session identity and snapshot types

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use vantage_core::SessionId;

/// Lifecycle state of a session
///
/// `Ended` is terminal: no transition leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Active,
    Ended,
}

/// Last persisted copy of session-scoped context data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSnapshot {
    /// Session-scoped context payload
    pub data: HashMap<String, Value>,

    /// Completeness of the snapshot, in [0, 1]
    pub quality_score: f64,

    pub captured_at: DateTime<Utc>,
}

/// A per-user session attached to a tenant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub session_id: SessionId,
    pub tenant_id: String,
    pub user_id: String,

    pub started_at: DateTime<Utc>,

    /// Instant of the last successful backup; equals `started_at` until the
    /// first backup
    pub last_backup_at: DateTime<Utc>,

    /// Set exactly once; an ended session cannot be reactivated
    pub ended_at: Option<DateTime<Utc>>,

    pub snapshot: Option<SessionSnapshot>,
}

impl Session {
    pub fn new(
        session_id: SessionId,
        tenant_id: impl Into<String>,
        user_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id,
            tenant_id: tenant_id.into(),
            user_id: user_id.into(),
            started_at: now,
            last_backup_at: now,
            ended_at: None,
            snapshot: None,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.ended_at.is_some() {
            SessionState::Ended
        } else {
            SessionState::Active
        }
    }

    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Quality score of the last snapshot, if any
    pub fn quality_score(&self) -> Option<f64> {
        self.snapshot.as_ref().map(|s| s.quality_score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_active() {
        let session = Session::new("s1".to_string(), "acme", "alice@acme.com", Utc::now());
        assert_eq!(session.state(), SessionState::Active);
        assert!(session.is_active());
        assert!(session.snapshot.is_none());
        assert_eq!(session.last_backup_at, session.started_at);
    }

    #[test]
    fn test_ended_session_state() {
        let mut session = Session::new("s1".to_string(), "acme", "alice@acme.com", Utc::now());
        session.ended_at = Some(Utc::now());
        assert_eq!(session.state(), SessionState::Ended);
        assert!(!session.is_active());
    }

    #[test]
    fn test_session_serde_roundtrip() {
        let mut session = Session::new("s1".to_string(), "acme", "alice@acme.com", Utc::now());
        session.snapshot = Some(SessionSnapshot {
            data: HashMap::from([("topics".to_string(), serde_json::json!(["pricing"]))]),
            quality_score: 0.25,
            captured_at: Utc::now(),
        });

        let bytes = serde_json::to_vec(&session).unwrap();
        let restored: Session = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(restored, session);
    }
}
