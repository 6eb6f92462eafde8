//! End-to-end integration tests for Vantage
//!
//! These tests wire the tenant registry, session manager, context store,
//! and switch coordinator together to verify the full context lifecycle:
//! switch, backup, crash recovery, expiry, and garbage collection.
//! The tests live under `tests/`.
