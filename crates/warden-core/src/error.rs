//! Request-level error taxonomy.
//!
//! Every pipeline stage returns [`GatewayError`]. Each variant maps to exactly one
//! [`ErrorKind`], and each kind maps to exactly one HTTP status, so a rejection is
//! rendered the same way no matter which stage produced it.

use crate::{
    auth::AuthError,
    cache::CacheError,
    store::StoreError,
};
use std::{fmt, time::Duration};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Rate limited, retry after {}ms", retry_after.as_millis())]
    RateLimited { retry_after: Duration },

    /// Store or cache collaborator failed. Cache failures never reach this
    /// variant on the read path; see [`crate::cache::UserCache`].
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Request deadline exceeded")]
    DeadlineExceeded,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable, machine-readable error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidToken,
    ExpiredToken,
    TokenNotYetValid,
    UntrustedIssuer,
    InvalidCredentials,
    InactiveAccount,
    InsufficientRole,
    NotOwnerNorAuthorized,
    ResourceNotFound,
    RateLimited,
    UpstreamUnavailable,
    SigningError,
    DeadlineExceeded,
    BadRequest,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidToken => "invalid_token",
            Self::ExpiredToken => "expired_token",
            Self::TokenNotYetValid => "token_not_yet_valid",
            Self::UntrustedIssuer => "untrusted_issuer",
            Self::InvalidCredentials => "invalid_credentials",
            Self::InactiveAccount => "inactive_account",
            Self::InsufficientRole => "insufficient_role",
            Self::NotOwnerNorAuthorized => "not_owner_nor_authorized",
            Self::ResourceNotFound => "resource_not_found",
            Self::RateLimited => "rate_limited",
            Self::UpstreamUnavailable => "upstream_unavailable",
            Self::SigningError => "signing_error",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::BadRequest => "bad_request",
            Self::Internal => "internal",
        }
    }

    /// HTTP status code the transport should respond with.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidToken
            | Self::ExpiredToken
            | Self::TokenNotYetValid
            | Self::UntrustedIssuer
            | Self::InvalidCredentials
            | Self::InactiveAccount => 401,
            Self::InsufficientRole | Self::NotOwnerNorAuthorized => 403,
            Self::ResourceNotFound => 404,
            Self::RateLimited => 429,
            Self::BadRequest => 400,
            Self::UpstreamUnavailable => 503,
            Self::DeadlineExceeded => 504,
            Self::SigningError | Self::Internal => 500,
        }
    }

    #[must_use]
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl GatewayError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Auth(err) => err.kind(),
            Self::ResourceNotFound(_) => ErrorKind::ResourceNotFound,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            Self::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            Self::BadRequest(_) => ErrorKind::BadRequest,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Whole seconds a client should wait before retrying, rounded up.
    #[must_use]
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after } => {
                let secs = retry_after.as_secs();
                Some(if retry_after.subsec_nanos() > 0 { secs + 1 } else { secs.max(1) })
            }
            _ => None,
        }
    }

    /// Message safe to return to a client. Server-side failures are not echoed.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::UpstreamUnavailable => "the server encountered a problem".to_string(),
            ErrorKind::SigningError | ErrorKind::Internal => {
                "the server encountered a problem and could not process your request".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Self::ResourceNotFound(what),
            StoreError::Conflict(msg) => Self::BadRequest(msg),
            StoreError::Database(msg) => Self::UpstreamUnavailable(msg),
        }
    }
}

impl From<CacheError> for GatewayError {
    fn from(err: CacheError) -> Self {
        Self::UpstreamUnavailable(err.to_string())
    }
}
