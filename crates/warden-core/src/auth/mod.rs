//! Caller identity: bearer tokens, roles, static operator credentials, and password hashing.
//!
//! # Authentication Flow
//!
//! ```text
//!   Authorization: Bearer eyJ...
//!        │
//!        ├──> Header parsing            ── malformed ──> InvalidToken
//!        │
//!        ├──> Structure + claims decode ── malformed ──> InvalidToken
//!        │
//!        ├──> Time window [nbf, exp)    ── now ≥ exp ──> ExpiredToken
//!        │                              ── now < nbf ──> TokenNotYetValid
//!        │
//!        ├──> HS256 signature + audience ── mismatch ──> InvalidToken
//!        │
//!        ├──> Issuer                    ── mismatch ──> UntrustedIssuer
//!        │
//!        └──> Claims (subject id) ──> role resolution ──> Principal
//! ```
//!
//! Token validation is pure: the [`TokenAuthenticator`] holds only immutable keys and
//! the trusted issuer after construction, so it is shared across requests without
//! locking. The role is not carried in the token; it is resolved per request through
//! the cache-aside user lookup in [`crate::access`].
//!
//! Operational endpoints use [`BasicCredentials`] instead, compared in constant time.

pub mod basic;
pub mod password;
pub mod principal;
pub mod token;

pub use basic::BasicCredentials;
pub use principal::{Principal, Role};
pub use token::{Claims, TokenAuthenticator};

use thiserror::Error;

use crate::error::ErrorKind;

/// Authentication and authorization failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Missing or malformed credential, bad signature, or missing claims
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    ExpiredToken,

    #[error("Token not yet valid")]
    TokenNotYetValid,

    #[error("Token issuer is not trusted")]
    UntrustedIssuer,

    /// The signing key is unavailable or rejected by the encoder
    #[error("Token signing failed: {0}")]
    SigningError(String),

    #[error("Insufficient role: requires {required}, caller is {actual}")]
    InsufficientRole { required: Role, actual: Role },

    #[error("Caller neither owns the resource nor holds a sufficient role")]
    NotOwnerNorAuthorized,

    /// Login or operator credentials did not match
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is not activated")]
    InactiveAccount,
}

impl AuthError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidToken(_) => ErrorKind::InvalidToken,
            Self::ExpiredToken => ErrorKind::ExpiredToken,
            Self::TokenNotYetValid => ErrorKind::TokenNotYetValid,
            Self::UntrustedIssuer => ErrorKind::UntrustedIssuer,
            Self::SigningError(_) => ErrorKind::SigningError,
            Self::InsufficientRole { .. } => ErrorKind::InsufficientRole,
            Self::NotOwnerNorAuthorized => ErrorKind::NotOwnerNorAuthorized,
            Self::InvalidCredentials => ErrorKind::InvalidCredentials,
            Self::InactiveAccount => ErrorKind::InactiveAccount,
        }
    }
}
