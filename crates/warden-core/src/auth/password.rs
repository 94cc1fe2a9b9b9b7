//! Password hashing and invitation tokens.
//!
//! Passwords are stored as Argon2id PHC strings. Invitation tokens are random
//! alphanumeric strings handed to a new user; only their SHA-256 digest is persisted,
//! so the store never sees the plaintext.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params,
};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Failed to generate secure random bytes")]
    Random,

    #[error("Failed to hash password: {0}")]
    Hash(String),
}

/// Hashes `password` with Argon2id (19 MiB, 2 iterations, parallelism 1).
///
/// # Errors
///
/// Returns [`PasswordError`] if salt generation or hashing fails.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let params =
        Params::new(19 * 1024, 2, 1, Some(32)).map_err(|e| PasswordError::Hash(e.to_string()))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut salt_bytes = [0u8; 16];
    SystemRandom::new().fill(&mut salt_bytes).map_err(|_| PasswordError::Random)?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| PasswordError::Hash(e.to_string()))?;

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::Hash(e.to_string()))?;

    Ok(hash.to_string())
}

/// Verifies `password` against a stored PHC hash. Unparseable hashes never match.
#[must_use]
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        return false;
    };

    Argon2::default().verify_password(password.as_bytes(), &parsed_hash).is_ok()
}

/// Generates a 32-character alphanumeric invitation token.
///
/// Rejection sampling keeps every character equally likely.
///
/// # Errors
///
/// Returns [`PasswordError::Random`] if the system RNG fails.
pub fn generate_invitation_token() -> Result<String, PasswordError> {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    const TOKEN_LENGTH: usize = 32;
    #[allow(clippy::cast_possible_truncation)]
    const MAX_UNBIASED: u8 = (256 / CHARSET.len() * CHARSET.len() - 1) as u8;

    let rng = SystemRandom::new();
    let mut token = String::with_capacity(TOKEN_LENGTH);
    let mut byte = [0u8; 1];

    while token.len() < TOKEN_LENGTH {
        rng.fill(&mut byte).map_err(|_| PasswordError::Random)?;
        if byte[0] <= MAX_UNBIASED {
            token.push(CHARSET[byte[0] as usize % CHARSET.len()] as char);
        }
    }

    Ok(token)
}

/// Hex-encoded SHA-256 digest, used to look up invitation tokens.
#[must_use]
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
