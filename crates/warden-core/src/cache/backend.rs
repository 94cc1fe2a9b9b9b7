use super::CacheError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Key/value cache with per-entry TTL.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Stores `value` under `key`, replacing any existing entry.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Longest TTL honoured; larger values are clamped.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// Process-local backend. Expired entries are dropped lazily on read and by
/// [`MemoryCacheBackend::purge_expired`].
pub struct MemoryCacheBackend {
    entries: DashMap<String, Entry>,
    max_entries: usize,
}

impl MemoryCacheBackend {
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self { entries: DashMap::new(), max_entries }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        // `set` may insert into shards `retain` has already visited.
        before.saturating_sub(self.entries.len())
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let now = Instant::now();

        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > now {
                return Ok(Some(entry.value.clone()));
            }
        } else {
            return Ok(None);
        }

        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        if !self.entries.contains_key(key) && self.entries.len() >= self.max_entries {
            self.purge_expired();
            if self.entries.len() >= self.max_entries {
                return Err(CacheError::Full);
            }
        }

        let expires_at = Instant::now() + ttl.min(MAX_TTL);
        self.entries.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }
}
