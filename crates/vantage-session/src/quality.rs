//! Snapshot completeness scoring
//!
//! A backup is only useful for restart recovery if it captures enough of
//! the conversation to resume from. The score is a weighted fraction of
//! four presence signals in the snapshot payload; weights are configuration,
//! not algorithm.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Snapshot key holding the active tenant context
pub const KEY_TENANT_CONTEXT: &str = "tenant_context";
/// Snapshot key holding recorded conversation turns
pub const KEY_TURNS: &str = "turns";
/// Snapshot key holding active participant identifiers
pub const KEY_PARTICIPANTS: &str = "participants";
/// Snapshot key holding topic tags
pub const KEY_TOPICS: &str = "topics";

/// Weights for the completeness signals
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotWeights {
    #[serde(default = "default_weight")]
    pub tenant_context: f64,

    #[serde(default = "default_weight")]
    pub conversation_turns: f64,

    #[serde(default = "default_weight")]
    pub participants: f64,

    #[serde(default = "default_weight")]
    pub topics: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl Default for SnapshotWeights {
    fn default() -> Self {
        Self {
            tenant_context: 1.0,
            conversation_turns: 1.0,
            participants: 1.0,
            topics: 1.0,
        }
    }
}

impl SnapshotWeights {
    /// Validate the weight configuration
    pub fn validate(&self) -> Result<(), String> {
        let weights = [
            self.tenant_context,
            self.conversation_turns,
            self.participants,
            self.topics,
        ];

        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err("snapshot weights must be finite and non-negative".to_string());
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err("snapshot weights must sum to a positive value".to_string());
        }
        Ok(())
    }

    fn total(&self) -> f64 {
        self.tenant_context + self.conversation_turns + self.participants + self.topics
    }
}

/// Score a snapshot payload against the expected fields, yielding [0, 1]
pub fn score_snapshot(data: &HashMap<String, Value>, weights: &SnapshotWeights) -> f64 {
    let total = weights.total();
    if total <= 0.0 {
        return 0.0;
    }

    let mut score = 0.0;
    if present(data.get(KEY_TENANT_CONTEXT)) {
        score += weights.tenant_context;
    }
    if present(data.get(KEY_TURNS)) {
        score += weights.conversation_turns;
    }
    if present(data.get(KEY_PARTICIPANTS)) {
        score += weights.participants;
    }
    if present(data.get(KEY_TOPICS)) {
        score += weights.topics;
    }

    (score / total).clamp(0.0, 1.0)
}

/// A signal counts only when its value is present and non-empty
fn present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}
