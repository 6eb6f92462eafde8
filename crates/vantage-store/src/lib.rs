//! Vantage Storage
//!
//! This crate provides the two storage layers of the subsystem:
//! - In-memory context record store with TTL and scope-indexed lookup
//! - Durable key-value state backend for session snapshots and tenant profiles

pub mod context_store;
pub mod state;

pub use context_store::{ContextRecord, ContextStore, DEFAULT_SWEEP_INTERVAL};
pub use state::{FileStateStore, MemoryStateStore, StateStore, StorageError, StorageResult};
