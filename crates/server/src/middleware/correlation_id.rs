//! Request ids in `x-request-id`.
//!
//! An inbound id is kept; otherwise a UUID v4 is generated. The id is copied onto the
//! response and into the request scope so every log line for a request can be joined.

use axum::http::{header::HeaderValue, HeaderMap, HeaderName, Request};
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use uuid::Uuid;

pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Generates UUID v4 request ids.
#[derive(Clone, Copy, Default)]
pub struct UuidRequestIdGenerator;

impl MakeRequestId for UuidRequestIdGenerator {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        Some(RequestId::new(HeaderValue::from_str(&id).ok()?))
    }
}

/// Returns `(set, propagate)`. Apply `propagate` first so it wraps the handler and
/// `set` runs outermost:
///
/// ```ignore
/// router.layer(propagate).layer(set)
/// ```
#[must_use]
pub fn create_request_id_layers(
) -> (SetRequestIdLayer<UuidRequestIdGenerator>, PropagateRequestIdLayer) {
    (
        SetRequestIdLayer::new(X_REQUEST_ID.clone(), UuidRequestIdGenerator),
        PropagateRequestIdLayer::new(X_REQUEST_ID.clone()),
    )
}

/// The request id set by the layers above, if it is valid UTF-8.
#[must_use]
pub fn request_id(headers: &HeaderMap) -> Option<String> {
    headers.get(&X_REQUEST_ID).and_then(|v| v.to_str().ok()).map(str::to_string)
}
