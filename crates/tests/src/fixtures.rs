//! Shared test application and helpers.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::{
    body::Body,
    extract::connect_info::MockConnectInfo,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::Value;
use server::{create_router, AppState, Services};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower::ServiceExt;
use warden_core::{
    auth::{password::hash_password, Claims, Role},
    cache::{CacheBackend, MemoryCacheBackend},
    config::AppConfig,
    store::{MemoryStore, NewPost, NewUser, Store},
};

pub const SECRET: &str = "integration-secret-0123456789";
pub const PASSWORD: &str = "correct horse battery";

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
}

pub struct TestAppBuilder {
    config: AppConfig,
    cache_backend: Arc<dyn CacheBackend>,
    client: SocketAddr,
}

impl TestAppBuilder {
    pub fn rate_limit(mut self, requests_per_window: u32, window: Duration) -> Self {
        self.config.rate_limiter.requests_per_window = requests_per_window;
        self.config.rate_limiter.window_seconds = window.as_secs();
        self
    }

    pub fn cache_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.cache_backend = backend;
        self
    }

    pub fn cache_op_timeout(mut self, timeout: Duration) -> Self {
        self.config.cache.op_timeout_ms = u64::try_from(timeout.as_millis()).unwrap();
        self
    }

    pub fn build(self) -> TestApp {
        let store = Arc::new(MemoryStore::new());
        let services = Services::from_config(self.config, store.clone(), self.cache_backend)
            .expect("test config has a token secret");
        let state = AppState::new(services);
        let app = create_router(state.clone()).layer(MockConnectInfo(self.client));
        TestApp { app, state, store }
    }
}

impl TestApp {
    pub fn builder() -> TestAppBuilder {
        let mut config = AppConfig::default();
        config.auth.token.secret = SECRET.to_string();
        config.auth.basic.user = "ops".to_string();
        config.auth.basic.pass = "ops-pass".to_string();

        TestAppBuilder {
            config,
            cache_backend: Arc::new(MemoryCacheBackend::new(1_000)),
            client: SocketAddr::from(([192, 0, 2, 10], 52_000)),
        }
    }

    pub async fn user(&self, name: &str, role: Role) -> i64 {
        self.store
            .create_user(NewUser {
                username: name.to_string(),
                email: format!("{name}@example.com"),
                password_hash: hash_password(PASSWORD).unwrap(),
                role,
                is_active: true,
            })
            .await
            .unwrap()
            .id
    }

    pub async fn post(&self, owner: i64, title: &str) -> i64 {
        self.store
            .create_post(NewPost {
                user_id: owner,
                title: title.to_string(),
                content: "body".to_string(),
                tags: vec!["test".to_string()],
            })
            .await
            .unwrap()
            .id
    }

    pub fn bearer(&self, user_id: i64) -> String {
        let (token, _) = self.state.services.tokens.issue_for(user_id).unwrap();
        format!("Bearer {token}")
    }

    /// Token whose `exp` is `expired_for` in the past.
    pub fn expired_bearer(&self, user_id: i64, expired_for: Duration) -> String {
        let tokens = &self.state.services.tokens;
        let ttl = Duration::from_secs(3600);
        let issued_at =
            Utc::now().timestamp() - i64::try_from((ttl + expired_for).as_secs()).unwrap();
        let claims = Claims::new(user_id, issued_at, ttl, tokens.issuer(), tokens.audience());
        format!("Bearer {}", tokens.issue(&claims).unwrap())
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        let body =
            if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        Response { status, headers, body }
    }
}

pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl Response {
    pub fn kind(&self) -> &str {
        self.body["kind"].as_str().unwrap_or_default()
    }
}

pub fn get(uri: &str, authorization: Option<&str>) -> Request<Body> {
    with_auth(Request::get(uri), authorization).body(Body::empty()).unwrap()
}

pub fn delete(uri: &str, authorization: Option<&str>) -> Request<Body> {
    with_auth(Request::delete(uri), authorization).body(Body::empty()).unwrap()
}

pub fn patch_json(uri: &str, authorization: Option<&str>, body: &Value) -> Request<Body> {
    with_auth(Request::patch(uri), authorization)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// PATCH with an arbitrary, possibly malformed, body.
pub fn patch_raw(uri: &str, authorization: Option<&str>, body: &str) -> Request<Body> {
    with_auth(Request::patch(uri), authorization)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn with_auth(
    builder: axum::http::request::Builder,
    authorization: Option<&str>,
) -> axum::http::request::Builder {
    match authorization {
        Some(value) => builder.header(header::AUTHORIZATION, value),
        None => builder,
    }
}
