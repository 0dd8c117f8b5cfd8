//! Validation token grammar and verification hashing.
//!
//! A token has the shape `<id>:<secret>` where `id` is a 26-character
//! alphanumeric identifier (a ULID in practice) and `secret` is 24 hex digits
//! (12 random bytes). Only the SHA-256 digest of the secret ever leaves this
//! module.

use std::fmt;

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Length of the identifier half.
pub const TOKEN_ID_LEN: usize = 26;

/// Length of the secret half.
pub const TOKEN_SECRET_LEN: usize = 24;

/// Separator between the two halves.
const SEPARATOR: char = ':';

/// Reasons a raw string is not a validation token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenFormatError {
    #[error("token must contain exactly one ':' separator")]
    Separator,

    #[error("token id must be 26 alphanumeric characters")]
    Id,

    #[error("token secret must be 24 hexadecimal characters")]
    Secret,
}

/// A well-formed validation token.
///
/// `Debug` redacts the secret half so tokens can sit inside logged structs.
#[derive(Clone, PartialEq, Eq)]
pub struct ValidationToken {
    id: String,
    secret: String,
}

impl ValidationToken {
    /// Parse a raw `<id>:<secret>` string.
    pub fn parse(raw: &str) -> Result<Self, TokenFormatError> {
        let mut parts = raw.split(SEPARATOR);
        let (Some(id), Some(secret), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(TokenFormatError::Separator);
        };

        if id.len() != TOKEN_ID_LEN || !id.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(TokenFormatError::Id);
        }
        if secret.len() != TOKEN_SECRET_LEN || !secret.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(TokenFormatError::Secret);
        }

        Ok(Self {
            id: id.to_string(),
            secret: secret.to_string(),
        })
    }

    /// The identifier half, used as the partition key of the token record.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The verification hash of the secret half, used as the row key.
    pub fn verification_hash(&self) -> VerificationHash {
        VerificationHash::of_secret(&self.secret)
    }
}

impl fmt::Debug for ValidationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationToken")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Lowercase hex SHA-256 digest of a token secret.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct VerificationHash(String);

impl VerificationHash {
    /// SHA-256 hash a secret exactly as presented (no case folding).
    pub fn of_secret(secret: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for VerificationHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VerificationHash(<redacted>)")
    }
}
