//! Stage Ordering Tests
//!
//! When a request would fail several checks, the earliest stage decides:
//! rate limit → authenticate → post context → authorize → handler.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::fixtures::{delete, get, patch_json, patch_raw, TestApp};
use axum::http::StatusCode;
use serde_json::json;
use std::time::Duration;
use warden_core::{
    auth::Role,
    store::{NewUser, Store},
};

const SECOND: Duration = Duration::from_secs(1);

#[tokio::test]
async fn test_route_chains_are_composed_in_order() {
    let t = TestApp::builder().build();
    let routes = &t.state.routes;

    assert_eq!(routes.health.stage_names(), ["rate_limit"]);
    assert_eq!(routes.get_user.stage_names(), ["rate_limit", "authenticate"]);
    assert_eq!(routes.get_post.stage_names(), ["rate_limit", "authenticate", "post_context"]);
    assert_eq!(
        routes.delete_post.stage_names(),
        ["rate_limit", "authenticate", "post_context", "authorize"]
    );
    assert_eq!(routes.debug_vars.stage_names(), ["basic_auth"]);
}

#[tokio::test]
async fn test_rate_limit_applies_before_authentication() {
    let t = TestApp::builder().rate_limit(1, Duration::from_secs(60)).build();

    let first = t.send(get("/v1/users/1", Some("Bearer garbage"))).await;
    assert_eq!(first.status, StatusCode::UNAUTHORIZED);

    let second = t.send(get("/v1/users/1", Some("Bearer garbage"))).await;
    assert_eq!(second.status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_authentication_applies_before_post_lookup() {
    let t = TestApp::builder().build();

    let response = t.send(delete("/v1/posts/999", None)).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.kind(), "invalid_token");
}

#[tokio::test]
async fn test_missing_post_is_reported_before_authorization() {
    let t = TestApp::builder().build();
    let stranger = t.user("stranger", Role::User).await;

    let response = t.send(delete("/v1/posts/999", Some(&t.bearer(stranger)))).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_authorization_applies_before_body_validation() {
    let t = TestApp::builder().build();
    let owner = t.user("owner", Role::User).await;
    let stranger = t.user("stranger", Role::User).await;
    let post = t.post(owner, "mine").await;

    let oversized = json!({"title": "x".repeat(500)});
    let response = t
        .send(patch_json(&format!("/v1/posts/{post}"), Some(&t.bearer(stranger)), &oversized))
        .await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_inactive_account_is_rejected_after_token_validation() {
    let t = TestApp::builder().build();
    let id = t
        .store
        .create_user(NewUser {
            username: "dormant".to_string(),
            email: "dormant@example.com".to_string(),
            password_hash: "unused".to_string(),
            role: Role::Admin,
            is_active: false,
        })
        .await
        .unwrap()
        .id;

    let uri = format!("/v1/users/{id}");

    let expired = t.send(get(&uri, Some(&t.expired_bearer(id, SECOND)))).await;
    assert_eq!(expired.kind(), "expired_token");

    let response = t.send(get(&uri, Some(&t.bearer(id)))).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.kind(), "inactive_account");
}

#[tokio::test]
async fn test_malformed_body_is_not_judged_before_authentication() {
    let t = TestApp::builder().build();
    let owner = t.user("owner", Role::User).await;
    let post = t.post(owner, "mine").await;
    let uri = format!("/v1/posts/{post}");

    let anonymous = t.send(patch_raw(&uri, None, "{not json")).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    assert_eq!(anonymous.kind(), "invalid_token");

    let owned = t.send(patch_raw(&uri, Some(&t.bearer(owner)), "{not json")).await;
    assert_eq!(owned.status, StatusCode::BAD_REQUEST);
    assert_eq!(owned.kind(), "bad_request");
}

#[tokio::test]
async fn test_malformed_bodies_count_against_rate_limit() {
    let t = TestApp::builder().rate_limit(1, Duration::from_secs(60)).build();

    let first = t.send(patch_raw("/v1/posts/1", None, "{not json")).await;
    assert_eq!(first.status, StatusCode::UNAUTHORIZED);

    let second = t.send(patch_raw("/v1/posts/1", None, "{not json")).await;
    assert_eq!(second.status, StatusCode::TOO_MANY_REQUESTS);

    let health = t.send(get("/v1/health", None)).await;
    assert_eq!(health.status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_malformed_login_body_is_rate_limited_first() {
    let t = TestApp::builder().rate_limit(1, Duration::from_secs(60)).build();
    let login = |body: &str| {
        axum::http::Request::post("/v1/authentication/token")
            .header(axum::http::header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from(body.to_string()))
            .unwrap()
    };

    let first = t.send(login("not json")).await;
    assert_eq!(first.status, StatusCode::BAD_REQUEST);

    let second = t.send(login("not json")).await;
    assert_eq!(second.status, StatusCode::TOO_MANY_REQUESTS);
}
