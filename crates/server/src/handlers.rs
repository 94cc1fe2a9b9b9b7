//! Terminal handlers. Each runs only after its pipeline admitted the request, so
//! the principal and post it reads from the scope are already checked.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use std::{sync::Arc, time::Instant};
use tracing::{error, info};
use warden_core::{
    access::AccessController,
    auth::{
        password::{sha256_hex, verify_password},
        AuthError, TokenAuthenticator,
    },
    cache::UserCache,
    error::GatewayError,
    middleware::RateLimiter,
    pipeline::{Handler, Reply, RequestScope},
    store::{PostUpdate, Store, StoreError},
};

/// Decodes the JSON body. Runs inside the handler, after every stage has admitted the request.
fn parse_body<T: DeserializeOwned>(scope: &RequestScope) -> Result<T, GatewayError> {
    let body = scope
        .body
        .as_deref()
        .ok_or_else(|| GatewayError::BadRequest("request body is required".to_string()))?;
    serde_json::from_slice(body)
        .map_err(|e| GatewayError::BadRequest(format!("malformed JSON body: {e}")))
}

pub struct Health {
    environment: String,
}

impl Health {
    #[must_use]
    pub fn new(environment: impl Into<String>) -> Self {
        Self { environment: environment.into() }
    }
}

#[async_trait]
impl Handler for Health {
    async fn call(&self, _scope: RequestScope) -> Result<Reply, GatewayError> {
        Ok(Reply::ok(json!({
            "status": "available",
            "environment": self.environment,
            "version": env!("CARGO_PKG_VERSION"),
        })))
    }
}

/// Operational counters for the basic-auth protected debug endpoint.
pub struct DebugVars {
    limiter: Arc<RateLimiter>,
    cache: Arc<UserCache>,
    started_at: Instant,
}

impl DebugVars {
    #[must_use]
    pub fn new(limiter: Arc<RateLimiter>, cache: Arc<UserCache>, started_at: Instant) -> Self {
        Self { limiter, cache, started_at }
    }
}

#[async_trait]
impl Handler for DebugVars {
    async fn call(&self, _scope: RequestScope) -> Result<Reply, GatewayError> {
        Ok(Reply::ok(json!({
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_seconds": self.started_at.elapsed().as_secs(),
            "rate_limiter": {
                "enabled": self.limiter.is_enabled(),
                "limit": self.limiter.limit(),
                "window_seconds": self.limiter.window().as_secs(),
                "tracked_clients": self.limiter.window_count(),
            },
            "cache": self.cache.stats(),
        })))
    }
}

#[derive(Deserialize)]
struct TokenRequest {
    email: String,
    password: String,
}

/// Exchanges email and password for a signed token.
pub struct IssueToken {
    store: Arc<dyn Store>,
    tokens: Arc<TokenAuthenticator>,
}

impl IssueToken {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, tokens: Arc<TokenAuthenticator>) -> Self {
        Self { store, tokens }
    }
}

#[async_trait]
impl Handler for IssueToken {
    async fn call(&self, scope: RequestScope) -> Result<Reply, GatewayError> {
        let request: TokenRequest = parse_body(&scope)?;

        let credentials =
            match scope.deadline.run(self.store.get_user_by_email(&request.email)).await? {
                Ok(credentials) => credentials,
                Err(StoreError::NotFound(_)) => return Err(AuthError::InvalidCredentials.into()),
                Err(e) => {
                    error!(error = %e, "credential lookup failed");
                    return Err(e.into());
                }
            };

        // Argon2 is CPU-bound; run it off the async workers.
        let hash = credentials.password_hash;
        let password = request.password;
        let matches = scope
            .deadline
            .run(tokio::task::spawn_blocking(move || verify_password(&password, &hash)))
            .await?
            .map_err(|e| GatewayError::Internal(format!("password verification panicked: {e}")))?;
        if !matches {
            return Err(AuthError::InvalidCredentials.into());
        }

        let (token, claims) = self.tokens.issue_for(credentials.user.id)?;
        info!(user_id = credentials.user.id, exp = claims.exp, "token issued");
        Ok(Reply::created(json!({ "token": token, "expires_at": claims.exp })))
    }
}

/// Consumes an invitation token and activates its user.
pub struct ActivateUser {
    access: Arc<AccessController>,
}

impl ActivateUser {
    #[must_use]
    pub fn new(access: Arc<AccessController>) -> Self {
        Self { access }
    }
}

#[async_trait]
impl Handler for ActivateUser {
    async fn call(&self, scope: RequestScope) -> Result<Reply, GatewayError> {
        let token = scope
            .resource_id
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GatewayError::BadRequest("missing invitation token".to_string()))?;

        let hash = sha256_hex(token);
        let user_id = match scope.deadline.run(self.access.store().activate_user(&hash)).await? {
            Ok(user_id) => user_id,
            Err(StoreError::NotFound(_)) => {
                return Err(GatewayError::ResourceNotFound("invitation".to_string()));
            }
            Err(e) => {
                error!(error = %e, "activation failed");
                return Err(e.into());
            }
        };

        self.access.invalidate_user(user_id).await;
        info!(user_id, "user activated");
        Ok(Reply::no_content())
    }
}

pub struct GetUser {
    access: Arc<AccessController>,
}

impl GetUser {
    #[must_use]
    pub fn new(access: Arc<AccessController>) -> Self {
        Self { access }
    }
}

#[async_trait]
impl Handler for GetUser {
    async fn call(&self, scope: RequestScope) -> Result<Reply, GatewayError> {
        let user_id = scope.resource_id()?;
        let user = self.access.resolve_user(user_id, scope.deadline).await?;
        Reply::json(&user)
    }
}

pub struct GetPost;

#[async_trait]
impl Handler for GetPost {
    async fn call(&self, mut scope: RequestScope) -> Result<Reply, GatewayError> {
        Reply::json(&scope.take_post()?)
    }
}

/// Partial update guarded by the post's version.
pub struct UpdatePost {
    store: Arc<dyn Store>,
}

impl UpdatePost {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Handler for UpdatePost {
    async fn call(&self, mut scope: RequestScope) -> Result<Reply, GatewayError> {
        let update: PostUpdate = parse_body(&scope)?;
        update.validate().map_err(GatewayError::BadRequest)?;

        let post = scope.take_post()?;
        if update.is_empty() {
            return Reply::json(&post);
        }

        let updated =
            scope.deadline.run(self.store.update_post(post.id, post.version, &update)).await??;
        info!(post_id = updated.id, version = updated.version, "post updated");
        Reply::json(&updated)
    }
}

pub struct DeletePost {
    store: Arc<dyn Store>,
}

impl DeletePost {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Handler for DeletePost {
    async fn call(&self, mut scope: RequestScope) -> Result<Reply, GatewayError> {
        let post = scope.take_post()?;
        scope.deadline.run(self.store.delete_post(post.id)).await??;
        info!(post_id = post.id, "post deleted");
        Ok(Reply::no_content())
    }
}
