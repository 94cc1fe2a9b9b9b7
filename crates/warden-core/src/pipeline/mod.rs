//! Ordered, short-circuiting request pipeline.
//!
//! A [`Pipeline`] is a list of [`Stage`]s wrapped around a terminal [`Handler`],
//! composed once at startup. Each stage receives the [`RequestScope`] by value and
//! either returns a result itself (short-circuit) or hands the scope to [`Next`].
//!
//! # Canonical Order
//!
//! ```text
//!   RequestScope
//!        │
//!        ▼
//!   ┌──────────────┐
//!   │  Rate limit  │ ── over quota ──────────► 429 RateLimited
//!   └──────┬───────┘
//!          ▼
//!   ┌──────────────┐
//!   │ Authenticate │ ── bad / expired token ─► 401
//!   └──────┬───────┘   (attaches Principal)
//!          ▼
//!   ┌──────────────┐
//!   │   Resource   │ ── missing ─────────────► 404 ResourceNotFound
//!   │   context    │   (attaches Post)
//!   └──────┬───────┘
//!          ▼
//!   ┌──────────────┐
//!   │  Authorize   │ ── not owner, role low ─► 403
//!   └──────┬───────┘
//!          ▼
//!       Handler
//! ```
//!
//! Operational endpoints use a separate pipeline whose only stage checks static
//! HTTP Basic credentials.
//!
//! The whole chain runs under the scope's [`Deadline`]; a chain still running when it
//! passes is dropped and the request fails with
//! [`GatewayError::DeadlineExceeded`].

pub mod scope;

pub use scope::{Deadline, RequestScope};

use crate::error::GatewayError;
use async_trait::async_trait;
use serde::Serialize;
use std::{future::Future, sync::Arc};

/// Successful outcome of a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    /// `None` renders as an empty body.
    pub data: Option<serde_json::Value>,
}

impl Reply {
    #[must_use]
    pub fn ok(data: serde_json::Value) -> Self {
        Self { status: 200, data: Some(data) }
    }

    #[must_use]
    pub fn created(data: serde_json::Value) -> Self {
        Self { status: 201, data: Some(data) }
    }

    #[must_use]
    pub fn no_content() -> Self {
        Self { status: 204, data: None }
    }

    /// Serializes `value` into a 200 reply.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if serialization fails.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, GatewayError> {
        serde_json::to_value(value)
            .map(Self::ok)
            .map_err(|e| GatewayError::Internal(format!("failed to encode reply: {e}")))
    }
}

/// One step of the chain.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn handle(&self, scope: RequestScope, next: Next<'_>) -> Result<Reply, GatewayError>;
}

/// Terminal business logic. Runs only after every stage admitted the request.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, scope: RequestScope) -> Result<Reply, GatewayError>;
}

/// Adapts an async closure into a [`Handler`].
pub struct HandlerFn<F>(F);

/// Wraps `f` as a [`Handler`].
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(RequestScope) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Reply, GatewayError>> + Send + 'static,
{
    HandlerFn(f)
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(RequestScope) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Reply, GatewayError>> + Send + 'static,
{
    async fn call(&self, scope: RequestScope) -> Result<Reply, GatewayError> {
        (self.0)(scope).await
    }
}

/// The remainder of the chain after the current stage.
pub struct Next<'a> {
    stages: &'a [Arc<dyn Stage>],
    handler: &'a dyn Handler,
}

impl Next<'_> {
    /// Passes `scope` to the next stage, or to the handler after the last stage.
    ///
    /// # Errors
    ///
    /// Returns whatever error the remaining stages or the handler produce.
    pub async fn run(self, scope: RequestScope) -> Result<Reply, GatewayError> {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                stage.handle(scope, Next { stages: rest, handler: self.handler }).await
            }
            None => self.handler.call(scope).await,
        }
    }
}

/// A composed chain of stages around a handler.
#[derive(Clone)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
    handler: Arc<dyn Handler>,
}

impl Pipeline {
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder { stages: Vec::new() }
    }

    /// Runs the chain for one request, bounded by the scope's deadline.
    ///
    /// # Errors
    ///
    /// Returns the first stage rejection, the handler's error, or
    /// [`GatewayError::DeadlineExceeded`].
    pub async fn execute(&self, scope: RequestScope) -> Result<Reply, GatewayError> {
        let deadline = scope.deadline;
        if deadline.is_expired() {
            return Err(GatewayError::DeadlineExceeded);
        }

        let next = Next { stages: &self.stages, handler: self.handler.as_ref() };
        deadline.run(next.run(scope)).await?
    }

    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

pub struct PipelineBuilder {
    stages: Vec<Arc<dyn Stage>>,
}

impl PipelineBuilder {
    /// Appends a stage. Stages run in the order they are added.
    #[must_use]
    pub fn stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    #[must_use]
    pub fn handler(self, handler: Arc<dyn Handler>) -> Pipeline {
        Pipeline { stages: self.stages, handler }
    }
}
