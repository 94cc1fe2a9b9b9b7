//! Rendering of pipeline outcomes as HTTP responses.
//!
//! Success bodies are wrapped as `{"data": ...}`. Errors are `{"error": message,
//! "kind": code}` with the status taken from the error's kind. Rate-limit
//! rejections carry `Retry-After` in whole seconds.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{debug, error};
use warden_core::{
    error::{ErrorKind, GatewayError},
    pipeline::Reply,
};

const BASIC_CHALLENGE: &str = r#"Basic realm="restricted", charset="UTF-8""#;

/// A [`GatewayError`] on its way out as HTTP.
#[derive(Debug)]
pub struct ApiError {
    error: GatewayError,
    basic_challenge: bool,
}

impl ApiError {
    /// Adds a `WWW-Authenticate: Basic` challenge to credential failures.
    #[must_use]
    pub fn with_basic_challenge(mut self) -> Self {
        self.basic_challenge = true;
        self
    }
}

impl From<GatewayError> for ApiError {
    fn from(error: GatewayError) -> Self {
        Self { error, basic_challenge: false }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.error.kind();
        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!(kind = %kind, error = %self.error, "request failed");
        } else {
            debug!(kind = %kind, error = %self.error, "request rejected");
        }

        let body = Json(json!({
            "error": self.error.public_message(),
            "kind": kind.as_str(),
        }));
        let mut response = (status, body).into_response();

        if let Some(secs) = self.error.retry_after_secs() {
            response.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        if self.basic_challenge && kind == ErrorKind::InvalidCredentials {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(BASIC_CHALLENGE));
        }

        response
    }
}

/// Renders a successful [`Reply`].
#[must_use]
pub fn reply_response(reply: Reply) -> Response {
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::OK);
    match reply.data {
        Some(data) => (status, Json(json!({ "data": data }))).into_response(),
        None => status.into_response(),
    }
}

#[must_use]
pub fn render(result: Result<Reply, GatewayError>) -> Response {
    match result {
        Ok(reply) => reply_response(reply),
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::time::Duration;
    use warden_core::auth::AuthError;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_success_is_wrapped_in_data() {
        let response = render(Ok(Reply::ok(json!({"id": 1}))));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"data": {"id": 1}}));
    }

    #[tokio::test]
    async fn test_no_content_has_empty_body() {
        let response = render(Ok(Reply::no_content()));
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_rate_limited_sets_retry_after() {
        let err = GatewayError::RateLimited { retry_after: Duration::from_millis(2500) };
        let response = render(Err(err));

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "3");
        assert_eq!(body_json(response).await["kind"], "rate_limited");
    }

    #[tokio::test]
    async fn test_expired_token_is_401_with_kind() {
        let response = render(Err(AuthError::ExpiredToken.into()));
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["kind"], "expired_token");
    }

    #[tokio::test]
    async fn test_basic_challenge_only_when_requested() {
        let plain = ApiError::from(GatewayError::from(AuthError::InvalidCredentials));
        assert!(plain.into_response().headers().get(header::WWW_AUTHENTICATE).is_none());

        let challenged = ApiError::from(GatewayError::from(AuthError::InvalidCredentials));
        let response = challenged.with_basic_challenge().into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], BASIC_CHALLENGE);
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let response = render(Err(GatewayError::Internal("db password is hunter2".into())));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(!body["error"].as_str().unwrap().contains("hunter2"));
    }
}
