use crate::{
    middleware::{create_request_id_layers, request_id},
    response::{render, ApiError},
    state::AppState,
};
use axum::{
    body::Bytes,
    extract::{ConnectInfo, Path, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{compression::CompressionLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use warden_core::pipeline::{Deadline, RequestScope};

/// Builds the scope shared by every route: client key, deadline, credentials.
fn request_scope(state: &AppState, addr: SocketAddr, headers: &HeaderMap) -> RequestScope {
    let deadline = Deadline::after(state.services.config.request_timeout());
    let mut scope = RequestScope::new(addr.ip().to_string(), deadline);

    if let Some(value) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        scope = scope.with_authorization(value);
    }
    if let Some(id) = request_id(headers) {
        scope = scope.with_request_id(id);
    }
    scope
}

pub async fn handle_health(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let scope = request_scope(&state, addr, &headers);
    render(state.routes.health.execute(scope).await)
}

pub async fn handle_debug_vars(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let scope = request_scope(&state, addr, &headers);
    match state.routes.debug_vars.execute(scope).await {
        Err(e) => ApiError::from(e).with_basic_challenge().into_response(),
        result => render(result),
    }
}

pub async fn handle_issue_token(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let scope = request_scope(&state, addr, &headers).with_body(body.to_vec());
    render(state.routes.issue_token.execute(scope).await)
}

pub async fn handle_activate_user(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(token): Path<String>,
    headers: HeaderMap,
) -> Response {
    let scope = request_scope(&state, addr, &headers).with_resource_id(token);
    render(state.routes.activate_user.execute(scope).await)
}

pub async fn handle_get_user(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let scope = request_scope(&state, addr, &headers).with_resource_id(user_id);
    render(state.routes.get_user.execute(scope).await)
}

pub async fn handle_get_post(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(post_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let scope = request_scope(&state, addr, &headers).with_resource_id(post_id);
    render(state.routes.get_post.execute(scope).await)
}

pub async fn handle_update_post(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(post_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let scope = request_scope(&state, addr, &headers)
        .with_resource_id(post_id)
        .with_body(body.to_vec());
    render(state.routes.update_post.execute(scope).await)
}

pub async fn handle_delete_post(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(post_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let scope = request_scope(&state, addr, &headers).with_resource_id(post_id);
    render(state.routes.delete_post.execute(scope).await)
}

/// Route table with the transport layers applied.
///
/// The router needs `ConnectInfo<SocketAddr>`; serve it with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn create_router(state: AppState) -> Router {
    let server = &state.services.config.server;
    let max_concurrent_requests = server.max_concurrent_requests;
    let max_body_bytes = server.max_body_bytes;
    let (set_request_id, propagate_request_id) = create_request_id_layers();

    Router::new()
        .route("/v1/health", get(handle_health))
        .route("/v1/debug/vars", get(handle_debug_vars))
        .route("/v1/authentication/token", post(handle_issue_token))
        .route("/v1/users/activate/{token}", put(handle_activate_user))
        .route("/v1/users/{userID}", get(handle_get_user))
        .route(
            "/v1/posts/{postID}",
            get(handle_get_post).patch(handle_update_post).delete(handle_delete_post),
        )
        .with_state(state)
        .layer(ConcurrencyLimitLayer::new(max_concurrent_requests))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        // Layers wrap in reverse order: `set` runs before `propagate`.
        .layer(propagate_request_id)
        .layer(set_request_id)
}
