//! Integration tests for the Warden gateway
//!
//! This crate drives the full HTTP router over in-memory collaborators:
//!
//! - `fixtures`: test application builder, users, tokens and request helpers
//! - `scenario_tests`: rate limiting, ownership and role checks, token expiry end to end
//! - `pipeline_order_tests`: which stage rejects first when several would
//! - `cache_failure_tests`: requests keep working when the user cache is broken or slow
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --package tests
//! ```
//!
//! No external services are needed; the store and cache are in-process.

#[cfg(test)]
mod fixtures;

#[cfg(test)]
mod scenario_tests;

#[cfg(test)]
mod pipeline_order_tests;

#[cfg(test)]
mod cache_failure_tests;
