use super::{CacheBackend, CacheError};
use crate::{config::CacheConfig, store::User};
use serde::Serialize;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::{debug, warn};

/// Hit/miss/error counters, exposed on the debug endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
}

/// Fail-open cache of [`User`] snapshots keyed by `user-{id}`.
///
/// Every backend call is bounded by `op_timeout`. Backend errors, timeouts and
/// undecodable entries are logged and counted, then reported as a miss (reads) or
/// ignored (writes). A cache built with [`UserCache::disabled`] is a permanent miss.
pub struct UserCache {
    backend: Option<Arc<dyn CacheBackend>>,
    ttl: Duration,
    op_timeout: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
}

impl UserCache {
    const DEFAULT_OP_TIMEOUT: Duration = Duration::from_millis(250);

    #[must_use]
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self {
            backend: Some(backend),
            ttl,
            op_timeout: Self::DEFAULT_OP_TIMEOUT,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self {
            backend: None,
            ttl: Duration::ZERO,
            op_timeout: Self::DEFAULT_OP_TIMEOUT,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// Builds from configuration; `backend` is ignored when caching is disabled.
    #[must_use]
    pub fn from_config(config: &CacheConfig, backend: Arc<dyn CacheBackend>) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        Self { op_timeout: config.op_timeout(), ..Self::new(backend, config.ttl()) }
    }

    #[must_use]
    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    fn key(user_id: i64) -> String {
        format!("user-{user_id}")
    }

    async fn bounded<T>(
        &self,
        op: impl std::future::Future<Output = Result<T, CacheError>>,
    ) -> Result<T, CacheError> {
        tokio::time::timeout(self.op_timeout, op).await.unwrap_or(Err(CacheError::Timeout))
    }

    /// Cached snapshot for `user_id`, or `None` on miss or backend failure.
    pub async fn get(&self, user_id: i64) -> Option<User> {
        let Some(backend) = &self.backend else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        let key = Self::key(user_id);
        let bytes = match self.bounded(backend.get(&key)).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            Err(e) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                self.record_error("get", &key, &e);
                return None;
            }
        };

        match serde_json::from_slice::<User>(&bytes) {
            Ok(user) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(user_id, "user cache hit");
                Some(user)
            }
            Err(e) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                self.record_error("decode", &key, &CacheError::Serialization(e.to_string()));
                None
            }
        }
    }

    /// Stores `user`, overwriting any existing entry. Failures are absorbed.
    pub async fn put(&self, user: &User) {
        let Some(backend) = &self.backend else {
            return;
        };

        let key = Self::key(user.id);
        let bytes = match serde_json::to_vec(user) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.record_error("encode", &key, &CacheError::Serialization(e.to_string()));
                return;
            }
        };

        if let Err(e) = self.bounded(backend.set(&key, bytes, self.ttl)).await {
            self.record_error("put", &key, &e);
        }
    }

    /// Drops the entry for `user_id`. Failures are absorbed.
    pub async fn invalidate(&self, user_id: i64) {
        let Some(backend) = &self.backend else {
            return;
        };

        let key = Self::key(user_id);
        if let Err(e) = self.bounded(backend.delete(&key)).await {
            self.record_error("invalidate", &key, &e);
        }
    }

    fn record_error(&self, op: &'static str, key: &str, error: &CacheError) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        warn!(op, key, error = %error, "user cache unavailable, continuing without it");
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            enabled: self.is_enabled(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}
