use super::AuthError;
use crate::config::TokenConfig;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, time::Duration};

/// Registered claims carried by every bearer token.
///
/// Timestamps are Unix seconds. `sub` holds the principal id in decimal form,
/// since the registered `sub` claim is a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

impl Claims {
    /// Claims valid from `issued_at` for `ttl`.
    #[must_use]
    pub fn new(
        subject: i64,
        issued_at: i64,
        ttl: Duration,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        Self {
            sub: subject.to_string(),
            iat: issued_at,
            nbf: issued_at,
            exp: issued_at.saturating_add(ttl),
            iss: issuer.into(),
            aud: audience.into(),
        }
    }

    /// Principal id named by the token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] if `sub` is not an integer id.
    pub fn subject_id(&self) -> Result<i64, AuthError> {
        self.sub
            .parse()
            .map_err(|_| AuthError::InvalidToken(format!("subject {:?} is not an id", self.sub)))
    }
}

/// Issues and validates HS256-signed bearer tokens.
///
/// Holds only immutable key material and the trusted issuer/audience, so a single
/// instance is shared by every request without locking.
pub struct TokenAuthenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    expiry: Duration,
    structure: Validation,
    signature: Validation,
}

impl std::fmt::Debug for TokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthenticator")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

impl TokenAuthenticator {
    /// # Errors
    ///
    /// Returns [`AuthError::SigningError`] if `secret` is empty.
    pub fn new(
        secret: &str,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        expiry: Duration,
    ) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::SigningError("signing secret is not configured".to_string()));
        }

        let audience = audience.into();

        // Decodes claims without checking the signature, so time-window failures are
        // reported as such even when the signature is also wrong.
        let mut structure = Validation::new(Algorithm::HS256);
        structure.insecure_disable_signature_validation();
        structure.validate_exp = false;
        structure.validate_nbf = false;
        structure.validate_aud = false;
        structure.required_spec_claims = HashSet::new();

        let mut signature = Validation::new(Algorithm::HS256);
        signature.validate_exp = false;
        signature.validate_nbf = false;
        signature.required_spec_claims = HashSet::new();
        signature.set_audience(&[audience.as_str()]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            audience,
            expiry,
            structure,
            signature,
        })
    }

    /// # Errors
    ///
    /// Returns [`AuthError::SigningError`] if the configured secret is empty.
    pub fn from_config(config: &TokenConfig) -> Result<Self, AuthError> {
        Self::new(&config.secret, &config.issuer, config.audience(), config.expiry())
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    #[must_use]
    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    /// Signs `claims` as given.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SigningError`] if encoding fails.
    pub fn issue(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::SigningError(e.to_string()))
    }

    /// Issues a token for `subject` with the configured issuer, audience and expiry,
    /// valid from now.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SigningError`] if encoding fails.
    pub fn issue_for(&self, subject: i64) -> Result<(String, Claims), AuthError> {
        let claims = Claims::new(
            subject,
            chrono::Utc::now().timestamp(),
            self.expiry,
            &self.issuer,
            &self.audience,
        );
        let token = self.issue(&claims)?;
        Ok((token, claims))
    }

    /// Validates `token` against the current time.
    ///
    /// # Errors
    ///
    /// See [`TokenAuthenticator::validate_at`].
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        self.validate_at(token, chrono::Utc::now().timestamp())
    }

    /// Validates `token` as of `now` (Unix seconds).
    ///
    /// A token is valid only while `nbf <= now < exp`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidToken`]: malformed structure, missing claims, bad
    ///   signature, wrong audience, or non-numeric subject
    /// - [`AuthError::ExpiredToken`]: `now >= exp`
    /// - [`AuthError::TokenNotYetValid`]: `now < nbf`
    /// - [`AuthError::UntrustedIssuer`]: `iss` differs from the configured issuer
    pub fn validate_at(&self, token: &str, now: i64) -> Result<Claims, AuthError> {
        let unverified = decode::<Claims>(token, &self.decoding_key, &self.structure)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?
            .claims;

        if now >= unverified.exp {
            return Err(AuthError::ExpiredToken);
        }
        if now < unverified.nbf {
            return Err(AuthError::TokenNotYetValid);
        }

        let claims = decode::<Claims>(token, &self.decoding_key, &self.signature)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?
            .claims;

        if claims.iss != self.issuer {
            return Err(AuthError::UntrustedIssuer);
        }

        claims.subject_id()?;
        Ok(claims)
    }

    /// Extracts the token from an `Authorization: Bearer <token>` header value.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] if the header is absent or not exactly
    /// `Bearer` followed by one space and a non-empty token.
    pub fn bearer(header: Option<&str>) -> Result<&str, AuthError> {
        let header = header
            .ok_or_else(|| AuthError::InvalidToken("authorization header is missing".into()))?;

        match header.split_once(' ') {
            Some(("Bearer", token)) if !token.is_empty() && !token.contains(' ') => Ok(token),
            _ => Err(AuthError::InvalidToken("authorization header is malformed".into())),
        }
    }
}
