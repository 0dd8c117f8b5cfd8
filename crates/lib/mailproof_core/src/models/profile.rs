//! User profiles.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{DecodeError, FiscalCode};

/// Database row for `profiles`. One row per version.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProfileRow {
    pub fiscal_code: String,
    pub version: i64,
    pub email: Option<String>,
    pub is_email_validated: bool,
    pub attributes: Value,
}

/// The latest version of a user profile.
///
/// Only `email` and `is_email_validated` are interpreted here; every other
/// profile field travels untouched in `attributes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub fiscal_code: FiscalCode,
    pub version: i64,
    pub email: Option<String>,
    pub is_email_validated: bool,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl Profile {
    /// Copy of this profile with the email marked as validated.
    pub fn with_email_validated(&self) -> Self {
        Self {
            is_email_validated: true,
            ..self.clone()
        }
    }

    /// Byte-exact comparison against the address a token was issued for.
    pub fn has_email(&self, email: &str) -> bool {
        self.email.as_deref() == Some(email)
    }
}

impl TryFrom<ProfileRow> for Profile {
    type Error = DecodeError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        let attributes = match row.attributes {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(DecodeError::InvalidField {
                    field: "attributes",
                    reason: format!("expected an object, got {}", json_kind(&other)),
                });
            }
        };
        Ok(Self {
            fiscal_code: FiscalCode::parse(&row.fiscal_code)?,
            version: row.version,
            email: row.email,
            is_email_validated: row.is_email_validated,
            attributes,
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
