//! HTTP transport for the warden authorization pipeline.
//!
//! Axum routes translate requests into [`warden_core::pipeline::RequestScope`]s,
//! run the route's pipeline, and render the outcome. No authorization decision is
//! made in this crate.

pub mod handlers;
pub mod middleware;
pub mod response;
pub mod router;
pub mod state;

pub use router::create_router;
pub use state::{AppState, Routes, Services};
