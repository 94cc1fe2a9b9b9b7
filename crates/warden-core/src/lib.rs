//! # Warden Core
//!
//! Request authorization pipeline for a small social API: who is calling, may they
//! call this often, and may they touch this resource.
//!
//! - **[`pipeline`]**: ordered, short-circuiting stage chain with per-request deadlines.
//! - **[`middleware`]**: the stages: rate limiting, bearer authentication, resource
//!   context, ownership/role authorization, and HTTP Basic for operational endpoints.
//! - **[`auth`]**: token issuance and validation, roles, password hashing.
//! - **[`access`]**: owner-or-role decisions and cache-aside role resolution.
//! - **[`cache`]**: fail-open user snapshot cache over a pluggable backend.
//! - **[`store`]**: durable store contract with `SQLite` and in-memory implementations.
//! - **[`config`]**: layered TOML + environment configuration.
//! - **[`error`]**: the error taxonomy every stage reports through.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           Pipeline                           │
//! │  RateLimitStage ─► AuthenticateStage ─► PostContextStage ─►  │
//! │                    AuthorizeStage ─► Handler                 │
//! └───────┬──────────────────┬──────────────────────┬────────────┘
//!         │                  │                      │
//!  ┌──────▼──────┐  ┌────────▼───────────┐  ┌─────▼───────┐
//!  │ RateLimiter │  │ TokenAuthenticator │  │    Store    │
//!  │  (DashMap)  │  │ AccessController ──┼─►│ (sqlx/mem)  │
//!  └─────────────┘  │    └─► UserCache   │  └─────────────┘
//!                   └────────────────────┘
//! ```

pub mod access;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod middleware;
pub mod pipeline;
pub mod store;
