//! Application configuration with layered loading.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//!
//! 1. **Compiled defaults**: Hardcoded in struct `Default` implementations
//! 2. **Config file**: TOML file specified by `WARDEN_CONFIG` env var
//! 3. **Environment variables**: `WARDEN__SECTION__FIELD` overrides specific fields
//!
//! # Configuration Sections
//!
//! - [`ServerConfig`]: bind address, concurrency, per-request deadline
//! - [`RateLimiterConfig`]: fixed-window limits
//! - [`AuthConfig`]: token signing ([`TokenConfig`]) and operator credentials
//!   ([`BasicAuthConfig`])
//! - [`CacheConfig`]: user cache TTL and sizing
//! - [`StoreConfig`]: database connection
//! - [`LoggingConfig`]: log level and format
//!
//! # Validation
//!
//! [`AppConfig::validate`] runs before the server starts. A missing signing secret or a
//! zero-length window is a startup error, never a per-request one.
//!
//! # Example
//!
//! ```toml
//! [server]
//! bind_port = 8080
//! request_timeout_seconds = 60
//!
//! [rate_limiter]
//! requests_per_window = 20
//! window_seconds = 5
//!
//! [auth.token]
//! secret = "change-me-to-a-long-random-string"
//! issuer = "warden"
//! ```

use crate::{cache::backend::MAX_TTL, pipeline::Deadline};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

/// HTTP server configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// IP address to bind the server to. Defaults to `127.0.0.1`.
    pub bind_address: String,

    /// Port number to listen on. Defaults to `8080`.
    pub bind_port: u16,

    /// Maximum number of requests processed concurrently. Defaults to `512`.
    pub max_concurrent_requests: usize,

    /// Per-request deadline in seconds, observed by every pipeline stage. Defaults to `60`.
    pub request_timeout_seconds: u64,

    /// Largest accepted request body in bytes. Defaults to 1 MiB.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            bind_port: 8080,
            max_concurrent_requests: 512,
            request_timeout_seconds: 60,
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Fixed-window rate limiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    pub enabled: bool,

    /// Requests admitted per client per window. Defaults to `20`.
    pub requests_per_window: u32,

    /// Window length in seconds. Defaults to `5`.
    pub window_seconds: u64,

    /// How often elapsed windows are pruned. Defaults to `60`.
    pub sweep_interval_seconds: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_window: 20,
            window_seconds: 5,
            sweep_interval_seconds: 60,
        }
    }
}

impl RateLimiterConfig {
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

/// Bearer token signing and validation.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// HMAC signing secret. Must be set; startup fails when it is empty.
    pub secret: String,

    /// Trusted issuer, written into and required of every token. Defaults to `warden`.
    pub issuer: String,

    /// Expected audience. Defaults to the issuer when unset.
    pub audience: Option<String>,

    /// Token lifetime in seconds. Defaults to three days.
    pub expiry_seconds: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            issuer: "warden".to_string(),
            audience: None,
            expiry_seconds: 3 * 24 * 60 * 60,
        }
    }
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &if self.secret.is_empty() { "<unset>" } else { "<redacted>" })
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("expiry_seconds", &self.expiry_seconds)
            .finish()
    }
}

impl TokenConfig {
    pub const MIN_SECRET_LEN: usize = 16;

    #[must_use]
    pub fn audience(&self) -> &str {
        self.audience.as_deref().unwrap_or(&self.issuer)
    }

    #[must_use]
    pub fn expiry(&self) -> Duration {
        Duration::from_secs(self.expiry_seconds)
    }
}

/// Static credentials for operational endpoints.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicAuthConfig {
    pub user: String,
    pub pass: String,
}

impl Default for BasicAuthConfig {
    fn default() -> Self {
        Self { user: "admin".to_string(), pass: String::new() }
    }
}

impl std::fmt::Debug for BasicAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuthConfig")
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub token: TokenConfig,
    pub basic: BasicAuthConfig,
}

/// User identity cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether the cache is consulted at all. Defaults to `true`.
    pub enabled: bool,

    /// Entry time-to-live in seconds. Defaults to `60`.
    pub ttl_seconds: u64,

    /// Maximum entries held by the in-memory backend. Defaults to `10000`.
    pub max_entries: usize,

    /// Upper bound on a single backend call in milliseconds. Defaults to `250`.
    pub op_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true, ttl_seconds: 60, max_entries: 10_000, op_timeout_ms: 250 }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    #[must_use]
    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }
}

/// Durable store connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// `SQLite` URL. Defaults to `sqlite://warden.db`.
    pub database_url: String,

    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { database_url: "sqlite://warden.db".to_string(), max_connections: 5 }
    }
}

/// Logging output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (e.g., "trace", "debug", "info", "warn", "error"). Defaults to `"info"`.
    pub level: String,

    /// Output format: `"json"` or `"pretty"`. Defaults to `"pretty"`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

/// Root application configuration containing all subsystem settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Deployment environment label, reported by the health endpoint.
    pub environment: String,
    pub server: ServerConfig,
    pub rate_limiter: RateLimiterConfig,
    pub auth: AuthConfig,
    pub cache: CacheConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            server: ServerConfig::default(),
            rate_limiter: RateLimiterConfig::default(),
            auth: AuthConfig::default(),
            cache: CacheConfig::default(),
            store: StoreConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file, overlaid with environment variables.
    ///
    /// Use `__` as a separator for nested fields (e.g., `WARDEN__AUTH__TOKEN__SECRET=...`).
    /// A missing file is not an error; defaults apply.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be parsed or deserialized.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(&config_path.as_ref().to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("WARDEN").prefix_separator("__").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Loads configuration from `config/config.toml` with fallback to defaults.
    ///
    /// The config file path can be overridden using the `WARDEN_CONFIG` environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration cannot be loaded or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("WARDEN_CONFIG").unwrap_or_else(|_| "config/config.toml".to_string());
        Self::from_file(&config_path)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_seconds)
    }

    /// Checks invariants the rest of the system relies on.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        let token = &self.auth.token;
        if token.secret.is_empty() {
            return Err("auth.token.secret must be set".to_string());
        }
        if token.secret.len() < TokenConfig::MIN_SECRET_LEN {
            return Err(format!(
                "auth.token.secret must be at least {} bytes",
                TokenConfig::MIN_SECRET_LEN
            ));
        }
        if token.issuer.is_empty() {
            return Err("auth.token.issuer must not be empty".to_string());
        }
        if token.expiry_seconds == 0 {
            return Err("auth.token.expiry_seconds must be greater than 0".to_string());
        }

        if self.auth.basic.user.is_empty() || self.auth.basic.pass.is_empty() {
            return Err("auth.basic.user and auth.basic.pass must both be set".to_string());
        }

        if self.rate_limiter.enabled && self.rate_limiter.window_seconds == 0 {
            return Err("rate_limiter.window_seconds must be greater than 0".to_string());
        }

        let max_timeout = Deadline::MAX_TIMEOUT.as_secs();
        if self.server.request_timeout_seconds == 0 {
            return Err("server.request_timeout_seconds must be greater than 0".to_string());
        }
        if self.server.request_timeout_seconds > max_timeout {
            return Err(format!("server.request_timeout_seconds must be at most {max_timeout}"));
        }
        if self.server.max_concurrent_requests == 0 {
            return Err("server.max_concurrent_requests must be greater than 0".to_string());
        }

        if self.cache.enabled && self.cache.ttl_seconds == 0 {
            return Err("cache.ttl_seconds must be greater than 0".to_string());
        }
        if self.cache.enabled && self.cache.ttl_seconds > MAX_TTL.as_secs() {
            return Err(format!("cache.ttl_seconds must be at most {}", MAX_TTL.as_secs()));
        }
        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err("cache.max_entries must be greater than 0".to_string());
        }

        if self.store.database_url.is_empty() {
            return Err("store.database_url must not be empty".to_string());
        }

        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            return Err(format!(
                "logging.format must be \"json\" or \"pretty\", got {:?}",
                self.logging.format
            ));
        }

        Ok(())
    }
}
