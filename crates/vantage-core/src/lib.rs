//! Vantage Core Types and Traits
//!
//! This crate provides the fundamental types and traits used throughout Vantage:
//! - Core error types
//! - Identifier validation and generation
//! - Scope, tier, and isolation enums
//! - Injected clock and metrics abstractions

pub mod clock;
pub mod error;
pub mod id;
pub mod metrics;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use id::{generate_secure_id, validate_identifier};
pub use metrics::{MetricsSink, NoopMetrics};
pub use types::{ContextId, ContextScope, IsolationLevel, SessionId, TenantId, TenantTier, UserId};
