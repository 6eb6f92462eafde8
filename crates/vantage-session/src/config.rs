//! Subsystem configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Garbage collection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcConfig {
    /// Seconds between background sweeps
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Sessions with no backup for this long are ended by the sweep
    #[serde(default = "default_idle_session_secs")]
    pub idle_session_secs: u64,
}

fn default_sweep_interval_secs() -> u64 {
    300 // 5 minutes
}

fn default_idle_session_secs() -> u64 {
    1800 // 30 minutes
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            idle_session_secs: default_idle_session_secs(),
        }
    }
}

impl GcConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn idle_session_threshold(&self) -> Duration {
        Duration::from_secs(self.idle_session_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.sweep_interval_secs == 0 {
            return Err("sweep_interval_secs must be at least 1".to_string());
        }
        if self.idle_session_secs == 0 {
            return Err("idle_session_secs must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Context switch coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Switches slower than this are logged as performance warnings
    #[serde(default = "default_switch_target_ms")]
    pub switch_target_ms: f64,

    /// TTL for the per-session context record established on switch
    /// (None = no expiry; the record lives until the session context is
    /// cleared)
    #[serde(default)]
    pub context_ttl_secs: Option<u64>,
}

fn default_switch_target_ms() -> f64 {
    5.0
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            switch_target_ms: default_switch_target_ms(),
            context_ttl_secs: None,
        }
    }
}

impl CoordinatorConfig {
    pub fn context_ttl(&self) -> Option<Duration> {
        self.context_ttl_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.switch_target_ms.is_finite() || self.switch_target_ms <= 0.0 {
            return Err("switch_target_ms must be positive".to_string());
        }
        if let Some(ttl) = self.context_ttl_secs {
            if ttl == 0 {
                return Err("context_ttl_secs must be at least 1 when set".to_string());
            }
        }
        Ok(())
    }
}

/// Restart detection thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartDetectionConfig {
    /// A session backed up within this window counts as recently active
    #[serde(default = "default_restart_idle_secs")]
    pub idle_threshold_secs: u64,

    /// Minimum snapshot quality to offer a session for restoration
    #[serde(default = "default_min_quality")]
    pub min_quality: f64,
}

fn default_restart_idle_secs() -> u64 {
    300
}

fn default_min_quality() -> f64 {
    0.5
}

impl Default for RestartDetectionConfig {
    fn default() -> Self {
        Self {
            idle_threshold_secs: default_restart_idle_secs(),
            min_quality: default_min_quality(),
        }
    }
}

impl RestartDetectionConfig {
    pub fn idle_threshold(&self) -> Duration {
        Duration::from_secs(self.idle_threshold_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.idle_threshold_secs == 0 {
            return Err("idle_threshold_secs must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.min_quality) {
            return Err("min_quality must be within [0, 1]".to_string());
        }
        Ok(())
    }
}
