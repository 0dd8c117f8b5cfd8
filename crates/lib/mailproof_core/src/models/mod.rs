//! Domain models.
//!
//! DB row structs mirror the table layout and may hold values that do not
//! satisfy the domain invariants; the `TryFrom` conversions into the domain
//! types are where those invariants are checked.

pub mod profile;
pub mod validation_token;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use profile::{Profile, ProfileRow};
pub use validation_token::{ValidationTokenRecord, ValidationTokenRow};

/// A persisted record that does not have the expected shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("invalid field '{field}': {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },
}

impl DecodeError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

const FISCAL_CODE_LEN: usize = 16;

/// Italian fiscal code, the stable subject identifier of a profile.
///
/// Grammar: `[A-Z]{6}[0-9LMNPQRSTUV]{2}[ABCDEHLMPRST][0-9LMNPQRSTUV]{2}[A-Z][0-9LMNPQRSTUV]{3}[A-Z]`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FiscalCode(String);

impl FiscalCode {
    pub fn parse(raw: &str) -> Result<Self, DecodeError> {
        let b = raw.as_bytes();
        if b.len() != FISCAL_CODE_LEN {
            return Err(DecodeError::invalid(
                "fiscal_code",
                format!("expected {FISCAL_CODE_LEN} characters"),
            ));
        }

        // Omocodia substitutes digits with letters from this set.
        let digit = |c: u8| c.is_ascii_digit() || b"LMNPQRSTUV".contains(&c);
        let letter = |c: u8| c.is_ascii_uppercase();
        let month = |c: u8| b"ABCDEHLMPRST".contains(&c);

        let ok = b[0..6].iter().all(|&c| letter(c))
            && b[6..8].iter().all(|&c| digit(c))
            && month(b[8])
            && b[9..11].iter().all(|&c| digit(c))
            && letter(b[11])
            && b[12..15].iter().all(|&c| digit(c))
            && letter(b[15]);

        if ok {
            Ok(Self(raw.to_string()))
        } else {
            Err(DecodeError::invalid("fiscal_code", "does not match the fiscal code grammar"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for FiscalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Personal data: keep the first three characters only.
        write!(f, "FiscalCode({}***)", &self.0[..3])
    }
}

impl TryFrom<String> for FiscalCode {
    type Error = DecodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FiscalCode> for String {
    fn from(value: FiscalCode) -> Self {
        value.0
    }
}

/// Minimal syntactic email check: one `@`, non-empty local part, a dotted
/// domain, no whitespace.
pub(crate) fn check_email(field: &'static str, email: &str) -> Result<(), DecodeError> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(DecodeError::invalid(field, "missing '@'"));
    };
    let well_formed = !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace);
    if well_formed {
        Ok(())
    } else {
        Err(DecodeError::invalid(field, "not a valid email address"))
    }
}
