use super::AuthError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use subtle::ConstantTimeEq;

/// Static operator credentials guarding operational endpoints (HTTP Basic).
#[derive(Clone)]
pub struct BasicCredentials {
    user: String,
    pass: String,
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials").field("user", &self.user).finish_non_exhaustive()
    }
}

impl BasicCredentials {
    #[must_use]
    pub fn new(user: impl Into<String>, pass: impl Into<String>) -> Self {
        Self { user: user.into(), pass: pass.into() }
    }

    /// Checks an `Authorization: Basic <base64(user:pass)>` header value.
    ///
    /// Both fields are compared in constant time, and both comparisons always run.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] if the header is absent, malformed, or
    /// does not match.
    pub fn verify(&self, header: Option<&str>) -> Result<(), AuthError> {
        let encoded = header
            .and_then(|h| h.strip_prefix("Basic "))
            .ok_or(AuthError::InvalidCredentials)?;

        let decoded = STANDARD.decode(encoded.trim()).map_err(|_| AuthError::InvalidCredentials)?;
        let decoded = String::from_utf8(decoded).map_err(|_| AuthError::InvalidCredentials)?;
        let (user, pass) = decoded.split_once(':').ok_or(AuthError::InvalidCredentials)?;

        let user_ok = user.as_bytes().ct_eq(self.user.as_bytes());
        let pass_ok = pass.as_bytes().ct_eq(self.pass.as_bytes());

        if (user_ok & pass_ok).into() {
            Ok(())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    /// Header value a client would send for these credentials.
    #[must_use]
    pub fn header_value(&self) -> String {
        format!("Basic {}", STANDARD.encode(format!("{}:{}", self.user, self.pass)))
    }
}
