//! Vantage Session Lifecycle
//!
//! This crate ties the tenant registry and the context store together:
//! - Session tracking with crash-recoverable snapshots
//! - Context switch coordination with namespaced tenant handles
//! - Background garbage collection of expired contexts and idle sessions

pub mod config;
pub mod gc;
pub mod manager;
pub mod quality;
pub mod session;
pub mod switch;

pub use config::{CoordinatorConfig, GcConfig, RestartDetectionConfig};
pub use gc::{spawn_gc_task, GarbageCollector, GcTask, SweepStats};
pub use manager::SessionManager;
pub use quality::{score_snapshot, SnapshotWeights};
pub use session::{Session, SessionSnapshot, SessionState};
pub use switch::{cache_namespace, context_namespace, ContextSwitchCoordinator, TenantContextHandle};
