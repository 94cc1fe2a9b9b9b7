use crate::{auth::Principal, error::GatewayError, store::Post};
use std::{future::Future, time::Duration};
use tokio::time::Instant;

/// Point in time by which a request must finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Instant);

impl Deadline {
    /// Longest timeout honoured; larger values are clamped.
    pub const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        Self(Instant::now() + timeout.min(Self::MAX_TIMEOUT))
    }

    #[must_use]
    pub fn at(instant: Instant) -> Self {
        Self(instant)
    }

    #[must_use]
    pub fn instant(&self) -> Instant {
        self.0
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.0
    }

    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }

    /// Runs `fut` to completion unless the deadline passes first.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::DeadlineExceeded`] if the deadline passes; `fut` is dropped.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, GatewayError> {
        tokio::time::timeout_at(self.0, fut).await.map_err(|_| GatewayError::DeadlineExceeded)
    }
}

/// Typed request state threaded through the pipeline.
///
/// The transport fills in the inbound fields. Stages attach the principal and the
/// target post as they succeed, and later stages read them back through accessors
/// that fail loudly if an earlier stage was left out of the chain.
#[derive(Debug, Clone)]
pub struct RequestScope {
    /// Rate limiting key, normally the client IP.
    pub client_key: String,
    pub deadline: Deadline,
    /// Raw `Authorization` header value.
    pub authorization: Option<String>,
    /// Raw path parameter naming the target resource.
    pub resource_id: Option<String>,
    /// Raw request body, decoded by the handler once every stage has admitted the request.
    pub body: Option<Vec<u8>>,
    pub request_id: Option<String>,
    principal: Option<Principal>,
    post: Option<Post>,
}

impl RequestScope {
    #[must_use]
    pub fn new(client_key: impl Into<String>, deadline: Deadline) -> Self {
        Self {
            client_key: client_key.into(),
            deadline,
            authorization: None,
            resource_id: None,
            body: None,
            request_id: None,
            principal: None,
            post: None,
        }
    }

    #[must_use]
    pub fn with_authorization(mut self, value: impl Into<String>) -> Self {
        self.authorization = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_resource_id(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    /// Attaches the raw body. An empty body is treated as absent.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        self.body = if body.is_empty() { None } else { Some(body) };
        self
    }

    #[must_use]
    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// Target resource id parsed as an integer.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::BadRequest`] if the id is absent or not an integer.
    pub fn resource_id(&self) -> Result<i64, GatewayError> {
        let raw = self
            .resource_id
            .as_deref()
            .ok_or_else(|| GatewayError::BadRequest("missing resource id".to_string()))?;
        raw.parse().map_err(|_| GatewayError::BadRequest(format!("invalid resource id {raw:?}")))
    }

    pub fn set_principal(&mut self, principal: Principal) {
        self.principal = Some(principal);
    }

    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if no authentication stage ran.
    pub fn principal(&self) -> Result<&Principal, GatewayError> {
        self.principal
            .as_ref()
            .ok_or_else(|| GatewayError::Internal("principal not resolved".to_string()))
    }

    pub fn set_post(&mut self, post: Post) {
        self.post = Some(post);
    }

    #[must_use]
    pub fn post(&self) -> Option<&Post> {
        self.post.as_ref()
    }

    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if no resource context stage ran.
    pub fn take_post(&mut self) -> Result<Post, GatewayError> {
        self.post.take().ok_or_else(|| GatewayError::Internal("post not loaded".to_string()))
    }
}
