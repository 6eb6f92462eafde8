//! Identifier validation and generation
//!
//! Identifiers (tenant IDs, session IDs, caller-supplied context IDs) are
//! embedded in storage keys and namespace strings, so they are restricted to
//! a filesystem- and key-safe character set.
//!
//! # Security
//!
//! Generated IDs use cryptographically secure random number generation
//! (OsRng) with 128 bits of entropy, encoded as 32 hex characters.

use rand::RngCore;

use crate::{Error, Result};

/// Maximum accepted identifier length
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Validate an identifier for use as a tenant ID or storage key segment
///
/// Accepts non-empty strings up to [`MAX_IDENTIFIER_LEN`] characters using
/// only alphanumerics, dash, underscore, and dot. Rejects `..` to prevent
/// path traversal when identifiers end up in file paths.
pub fn validate_identifier(id: &str) -> Result<()> {
    if id.is_empty() || id.len() > MAX_IDENTIFIER_LEN {
        return Err(Error::InvalidIdentifier(format!(
            "identifier length must be 1-{} characters",
            MAX_IDENTIFIER_LEN
        )));
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(Error::InvalidIdentifier(format!(
            "identifier {} contains characters outside [A-Za-z0-9._-]",
            id
        )));
    }

    if id.contains("..") {
        return Err(Error::InvalidIdentifier(format!(
            "identifier {} contains path traversal sequence",
            id
        )));
    }

    Ok(())
}

/// Generate a cryptographically secure ID using OsRng
/// Format: 32 hex characters (128 bits of entropy)
pub fn generate_secure_id() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        assert!(validate_identifier("acme").is_ok());
        assert!(validate_identifier("acme-corp_01").is_ok());
        assert!(validate_identifier("org.team").is_ok());
    }

    #[test]
    fn test_empty_identifier_rejected() {
        assert!(matches!(
            validate_identifier(""),
            Err(Error::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_too_long_identifier_rejected() {
        let long = "a".repeat(MAX_IDENTIFIER_LEN + 1);
        assert!(validate_identifier(&long).is_err());
    }

    #[test]
    fn test_invalid_characters_rejected() {
        assert!(validate_identifier("acme corp").is_err());
        assert!(validate_identifier("acme/corp").is_err());
        assert!(validate_identifier("acme@corp").is_err());
        assert!(validate_identifier("tenant:a").is_err());
    }

    #[test]
    fn test_path_traversal_rejected() {
        assert!(validate_identifier("..").is_err());
        assert!(validate_identifier("a..b").is_err());
    }

    #[test]
    fn test_generated_ids_unique_and_well_formed() {
        let id1 = generate_secure_id();
        let id2 = generate_secure_id();

        assert_ne!(id1, id2);
        assert_eq!(id1.len(), 32);
        assert!(id1.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(validate_identifier(&id1).is_ok());
    }
}
