//! Error types for Vantage Core

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    // Uniqueness violations on create
    #[error("Duplicate context: {0}")]
    DuplicateContext(String),

    #[error("Duplicate tenant: {0}")]
    DuplicateTenant(String),

    // Authorization failures carry identifiers only, never user data
    #[error("Access denied for tenant {0}")]
    AccessDenied(String),

    // Absent or expired references are both reported as not found
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
