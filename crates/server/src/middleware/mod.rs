//! HTTP-only middleware. Authorization logic lives in `warden_core::middleware`.

pub mod correlation_id;

pub use correlation_id::{
    create_request_id_layers, request_id, UuidRequestIdGenerator, X_REQUEST_ID,
};
