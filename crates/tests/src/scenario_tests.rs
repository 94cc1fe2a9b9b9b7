//! End-to-end authorization scenarios
//!
//! Each test drives the HTTP router with in-memory store and cache:
//! 1. Fixed-window rate limiting admits exactly `limit` requests per window
//! 2. Elevated roles may act on resources they do not own only up to their level
//! 3. Owners may act on their own resources regardless of role
//! 4. Expired tokens are rejected with a distinct error kind

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::fixtures::{delete, get, patch_json, TestApp};
use axum::http::{header, StatusCode};
use serde_json::json;
use std::time::Duration;
use warden_core::auth::Role;

#[tokio::test]
async fn test_third_request_in_window_is_rate_limited() {
    let t = TestApp::builder().rate_limit(2, Duration::from_secs(5)).build();

    let first = t.send(get("/v1/health", None)).await;
    let second = t.send(get("/v1/health", None)).await;
    let third = t.send(get("/v1/health", None)).await;

    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(third.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(third.kind(), "rate_limited");

    let retry_after: u64 = third.headers[header::RETRY_AFTER].to_str().unwrap().parse().unwrap();
    assert!((1..=5).contains(&retry_after), "retry after {retry_after}s");
}

#[tokio::test]
async fn test_moderator_edits_but_cannot_delete_others_post() {
    let t = TestApp::builder().build();
    let author = t.user("author", Role::User).await;
    let moderator = t.user("moderator", Role::Moderator).await;
    let post = t.post(author, "original").await;
    let auth = t.bearer(moderator);
    let uri = format!("/v1/posts/{post}");

    let edit = t.send(patch_json(&uri, Some(&auth), &json!({"title": "moderated"}))).await;
    assert_eq!(edit.status, StatusCode::OK);
    assert_eq!(edit.body["data"]["title"], "moderated");
    assert_eq!(edit.body["data"]["user_id"], author);

    let removal = t.send(delete(&uri, Some(&auth))).await;
    assert_eq!(removal.status, StatusCode::FORBIDDEN);
    assert_eq!(removal.kind(), "not_owner_nor_authorized");

    let still_there = t.send(get(&uri, Some(&auth))).await;
    assert_eq!(still_there.status, StatusCode::OK);
}

#[tokio::test]
async fn test_owner_with_lowest_role_edits_and_deletes_own_post() {
    let t = TestApp::builder().build();
    let owner = t.user("owner", Role::User).await;
    let post = t.post(owner, "mine").await;
    let auth = t.bearer(owner);
    let uri = format!("/v1/posts/{post}");

    let edit = t.send(patch_json(&uri, Some(&auth), &json!({"content": "edited"}))).await;
    assert_eq!(edit.status, StatusCode::OK);
    assert_eq!(edit.body["data"]["content"], "edited");

    let removal = t.send(delete(&uri, Some(&auth))).await;
    assert_eq!(removal.status, StatusCode::NO_CONTENT);

    let gone = t.send(get(&uri, Some(&auth))).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
    assert_eq!(gone.kind(), "resource_not_found");
}

#[tokio::test]
async fn test_other_user_cannot_edit_post() {
    let t = TestApp::builder().build();
    let owner = t.user("owner", Role::User).await;
    let stranger = t.user("stranger", Role::User).await;
    let post = t.post(owner, "mine").await;

    let edit = t
        .send(patch_json(
            &format!("/v1/posts/{post}"),
            Some(&t.bearer(stranger)),
            &json!({"title": "hijacked"}),
        ))
        .await;
    assert_eq!(edit.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_deletes_others_post() {
    let t = TestApp::builder().build();
    let owner = t.user("owner", Role::User).await;
    let admin = t.user("admin", Role::Admin).await;
    let post = t.post(owner, "mine").await;

    let removal = t.send(delete(&format!("/v1/posts/{post}"), Some(&t.bearer(admin)))).await;
    assert_eq!(removal.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_expired_token_is_rejected_with_kind() {
    let t = TestApp::builder().build();
    let user = t.user("late", Role::Admin).await;
    let auth = t.expired_bearer(user, Duration::from_secs(1));

    let response = t.send(get(&format!("/v1/users/{user}"), Some(&auth))).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.kind(), "expired_token");
}

#[tokio::test]
async fn test_tampered_token_is_invalid() {
    let t = TestApp::builder().build();
    let user = t.user("someone", Role::User).await;

    let mut forged = t.bearer(user);
    forged.push('x');
    let response = t.send(get(&format!("/v1/users/{user}"), Some(&forged))).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.kind(), "invalid_token");
}
