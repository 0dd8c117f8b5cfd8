//! API request/response bodies.

use serde::{Deserialize, Serialize};

/// Error body returned for non-redirect failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// `GET /api/info` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub name: String,
    pub version: String,
    pub token_store_connected: bool,
    pub profile_store_connected: bool,
}

/// Query string of the validation link.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidateProfileEmailQuery {
    pub token: Option<String>,
}
