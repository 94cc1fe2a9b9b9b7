use thiserror::Error;
use warden_core::{auth::AuthError, store::StoreError};

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Error: {0}")]
    General(String),
}

pub type CliResult<T> = Result<T, CliError>;

pub fn print_success(message: &str) {
    println!("[SUCCESS] {message}");
}

pub fn print_error(message: &str) {
    eprintln!("[ERROR] {message}");
}

pub fn print_info(message: &str) {
    println!("[INFO] {message}");
}

pub fn print_warning(message: &str) {
    println!("[WARNING] {message}");
}

/// Shows the first and last four characters of a secret.
#[must_use]
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret(""), "");
        assert_eq!(mask_secret("short"), "*****");
        assert_eq!(mask_secret("0123456789abcdef"), "0123...cdef");
    }

    #[test]
    fn test_error_display() {
        assert_eq!(CliError::Config("bad".into()).to_string(), "Configuration error: bad");
        let err = CliError::from(AuthError::ExpiredToken);
        assert_eq!(err.to_string(), "Authentication error: Token expired");
    }
}
