//! Validation token records, created by the issuance process.

use chrono::{DateTime, Utc};

use super::{DecodeError, FiscalCode, check_email};

/// Database row for `validation_tokens`.
///
/// Columns are nullable so that rows written by an older or broken issuer can
/// still be read and reported as undecodable.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ValidationTokenRow {
    pub partition_key: String,
    pub row_key: String,
    pub fiscal_code: Option<String>,
    pub email: Option<String>,
    pub invalid_after: Option<DateTime<Utc>>,
}

/// An issued, not yet expired (or possibly expired) email validation challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationTokenRecord {
    /// Profile the challenge was issued for.
    pub fiscal_code: FiscalCode,
    /// Address the link was sent to.
    pub email: String,
    /// The token is valid up to and including this instant.
    pub invalid_after: DateTime<Utc>,
}

impl ValidationTokenRecord {
    /// Whether `now` is strictly past the validity window.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.invalid_after
    }
}

impl TryFrom<ValidationTokenRow> for ValidationTokenRecord {
    type Error = DecodeError;

    fn try_from(row: ValidationTokenRow) -> Result<Self, Self::Error> {
        let fiscal_code = row
            .fiscal_code
            .ok_or(DecodeError::MissingField("fiscal_code"))?;
        let email = row.email.ok_or(DecodeError::MissingField("email"))?;
        let invalid_after = row
            .invalid_after
            .ok_or(DecodeError::MissingField("invalid_after"))?;

        check_email("email", &email)?;

        Ok(Self {
            fiscal_code: FiscalCode::parse(&fiscal_code)?,
            email,
            invalid_after,
        })
    }
}
