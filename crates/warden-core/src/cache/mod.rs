//! Cache-aside storage for user identity snapshots.
//!
//! ```text
//!   lookup(user_id)
//!        │
//!        ├──> UserCache::get ── hit ──────────────────────────► User
//!        │        │
//!        │        ├── miss
//!        │        └── backend error / timeout ── logged, counted, treated as miss
//!        │
//!        ├──> Store::get_user_by_id (bounded by the request deadline)
//!        │
//!        └──> UserCache::put (best-effort) ───────────────────► User
//! ```
//!
//! The backend is a collaborator behind [`CacheBackend`]. Its absence or failure is
//! never visible to a caller: [`UserCache`] downgrades every backend error to a miss
//! on reads and to a no-op on writes, so the pipeline degrades to store-only reads.
//! Entries are last-writer-wins and expire after the configured TTL.

pub mod backend;
pub mod user_cache;

pub use backend::{CacheBackend, MemoryCacheBackend};
pub use user_cache::{CacheStats, UserCache};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("Cache backend timed out")]
    Timeout,

    #[error("Cache is full")]
    Full,

    #[error("Cache serialization failed: {0}")]
    Serialization(String),
}
