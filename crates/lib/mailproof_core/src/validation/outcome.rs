//! Validation outcomes and their callback redirects.

use std::fmt;

use thiserror::Error;
use url::Url;

/// Why a validation attempt failed, as exposed to the callback page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationFailure {
    /// Infrastructure failure or unexpectedly missing data.
    GenericError,
    /// Absent, malformed, undecodable or no longer matching token.
    InvalidToken,
    /// Valid token used after its validity window.
    TokenExpired,
}

impl ValidationFailure {
    pub fn as_str(self) -> &'static str {
        match self {
            ValidationFailure::GenericError => "GENERIC_ERROR",
            ValidationFailure::InvalidToken => "INVALID_TOKEN",
            ValidationFailure::TokenExpired => "TOKEN_EXPIRED",
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one validation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationOutcome {
    Success,
    Failure(ValidationFailure),
}

impl ValidationOutcome {
    pub fn is_success(self) -> bool {
        self == ValidationOutcome::Success
    }

    /// `SUCCESS` or the failure code.
    pub fn as_str(self) -> &'static str {
        match self {
            ValidationOutcome::Success => "SUCCESS",
            ValidationOutcome::Failure(kind) => kind.as_str(),
        }
    }
}

impl From<ValidationFailure> for ValidationOutcome {
    fn from(kind: ValidationFailure) -> Self {
        ValidationOutcome::Failure(kind)
    }
}

/// Errors for callback URLs that cannot carry the result query string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallbackUrlError {
    #[error("invalid URL: {0}")]
    Parse(#[from] url::ParseError),

    #[error("unsupported scheme '{0}', expected http or https")]
    Scheme(String),

    #[error("callback URL must not carry a query string or fragment")]
    HasQuery,
}

/// Absolute `http(s)` URL of the page that renders the validation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackUrl(Url);

impl CallbackUrl {
    pub fn parse(raw: &str) -> Result<Self, CallbackUrlError> {
        Self::try_from(Url::parse(raw)?)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Build the redirect target for `outcome`, stamped with `now_millis`.
    ///
    /// - success: `<base>?result=success&time=<ms>`
    /// - failure: `<base>?result=failure&error=<KIND>&time=<ms>`
    pub fn redirect_for(&self, outcome: ValidationOutcome, now_millis: i64) -> String {
        match outcome {
            ValidationOutcome::Success => {
                format!("{}?result=success&time={now_millis}", self.as_str())
            }
            ValidationOutcome::Failure(kind) => format!(
                "{}?result=failure&error={kind}&time={now_millis}",
                self.as_str()
            ),
        }
    }
}

impl TryFrom<Url> for CallbackUrl {
    type Error = CallbackUrlError;

    fn try_from(url: Url) -> Result<Self, Self::Error> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CallbackUrlError::Scheme(url.scheme().to_string()));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(CallbackUrlError::HasQuery);
        }
        Ok(Self(url))
    }
}

impl fmt::Display for CallbackUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
