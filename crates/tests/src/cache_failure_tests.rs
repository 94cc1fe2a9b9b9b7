//! User cache degradation
//!
//! The cache sits in front of the store for identity lookups. A cache that errors
//! or stalls must cost latency at most, never a failed request.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::fixtures::{get, TestApp};
use async_trait::async_trait;
use axum::http::StatusCode;
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use warden_core::{
    auth::Role,
    cache::{CacheBackend, CacheError, MemoryCacheBackend},
};

/// Backend that fails every call and counts them.
#[derive(Default)]
struct UnavailableBackend {
    calls: AtomicUsize,
}

#[async_trait]
impl CacheBackend for UnavailableBackend {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Unavailable("connection reset by peer".to_string()))
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Unavailable("connection reset by peer".to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Unavailable("connection reset by peer".to_string()))
    }
}

/// Backend whose calls never complete.
struct StalledBackend;

#[async_trait]
impl CacheBackend for StalledBackend {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        std::future::pending().await
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), CacheError> {
        std::future::pending().await
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn test_unavailable_cache_falls_back_to_store() {
    let backend = Arc::new(UnavailableBackend::default());
    let t = TestApp::builder().cache_backend(backend.clone()).build();
    let id = t.user("resilient", Role::User).await;

    let response = t.send(get(&format!("/v1/users/{id}"), Some(&t.bearer(id)))).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["username"], "resilient");
    assert!(backend.calls.load(Ordering::SeqCst) > 0);

    let stats = t.state.services.cache.stats();
    assert_eq!(stats.hits, 0);
    assert!(stats.errors > 0);
}

#[tokio::test]
async fn test_stalled_cache_is_bounded_by_op_timeout() {
    let t = TestApp::builder()
        .cache_backend(Arc::new(StalledBackend))
        .cache_op_timeout(Duration::from_millis(20))
        .build();
    let id = t.user("patient", Role::User).await;

    let started = Instant::now();
    let response = t.send(get(&format!("/v1/users/{id}"), Some(&t.bearer(id)))).await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(started.elapsed() < Duration::from_secs(5), "took {:?}", started.elapsed());
}

#[tokio::test]
async fn test_working_cache_serves_repeat_lookups() {
    let backend = Arc::new(MemoryCacheBackend::new(100));
    let t = TestApp::builder().cache_backend(backend.clone()).build();
    let id = t.user("cached", Role::Moderator).await;
    let auth = t.bearer(id);

    let first = t.send(get(&format!("/v1/users/{id}"), Some(&auth))).await;
    let second = t.send(get(&format!("/v1/users/{id}"), Some(&auth))).await;

    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(second.body, first.body);
    assert_eq!(backend.len(), 1);

    let stats = t.state.services.cache.stats();
    assert_eq!(stats.misses, 1);
    assert!(stats.hits >= 3, "hits: {}", stats.hits);
}
