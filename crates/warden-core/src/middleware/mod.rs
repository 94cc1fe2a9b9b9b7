//! Pipeline stages.
//!
//! Each stage is a thin adapter between a [`RequestScope`](crate::pipeline::RequestScope)
//! and one piece of business logic that lives elsewhere in the crate:
//!
//! | Stage                 | Logic                             | Rejection                      |
//! |-----------------------|-----------------------------------|--------------------------------|
//! | [`RateLimitStage`]    | [`RateLimiter`] window per client | 429 `rate_limited`             |
//! | [`AuthenticateStage`] | bearer token + cached role        | 401 `invalid_token`, ...       |
//! | [`PostContextStage`]  | post loaded from the store        | 404 `resource_not_found`       |
//! | [`AuthorizeStage`]    | owner OR role ≥ minimum           | 403 `not_owner_nor_authorized` |
//! | [`BasicAuthStage`]    | static operator credentials       | 401 `invalid_credentials`      |
//!
//! HTTP concerns (headers, status codes, JSON decoding) stay in the `server` crate;
//! stages only see the already-extracted scope fields.

pub mod auth;
pub mod authorize;
pub mod basic;
pub mod rate_limiting;
pub mod resource;

pub use auth::AuthenticateStage;
pub use authorize::{AuthorizeStage, Requirement};
pub use basic::BasicAuthStage;
pub use rate_limiting::{RateDecision, RateLimitStage, RateLimiter};
pub use resource::PostContextStage;
