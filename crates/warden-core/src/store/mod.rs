//! Durable store contract.
//!
//! The pipeline treats the store as slow, fallible, and cancellable: every call made
//! on behalf of a request is bounded by that request's deadline. Implementations:
//!
//! - [`SqliteStore`]: `SQLite` via `sqlx`, with an idempotent schema bootstrap
//! - [`MemoryStore`]: concurrent in-memory store for tests and demo deployments

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::auth::Role;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_TITLE_LEN: usize = 100;
pub const MAX_CONTENT_LEN: usize = 1000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    /// Unique constraint or optimistic-concurrency conflict
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("record".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Conflict(db.message().to_string())
            }
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                Self::NotFound("referenced record".to_string())
            }
            other => Self::Database(other.to_string()),
        }
    }
}

/// Identity snapshot. This is what the user cache holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A user together with their password hash. Never cached.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
}

/// Partial post update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl PostUpdate {
    /// # Errors
    ///
    /// Returns a description of the first field that violates its length limit.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(title) = &self.title {
            if title.chars().count() > MAX_TITLE_LEN {
                return Err(format!("title must be at most {MAX_TITLE_LEN} characters"));
            }
        }
        if let Some(content) = &self.content {
            if content.chars().count() > MAX_CONTENT_LEN {
                return Err(format!("content must be at most {MAX_CONTENT_LEN} characters"));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.tags.is_none()
    }

    pub(crate) fn apply(&self, post: &mut Post, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            post.title.clone_from(title);
        }
        if let Some(content) = &self.content {
            post.content.clone_from(content);
        }
        if let Some(tags) = &self.tags {
            post.tags.clone_from(tags);
        }
        post.version += 1;
        post.updated_at = now;
    }
}

/// Source of truth for users, posts, and invitations.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_user_by_id(&self, id: i64) -> Result<User, StoreError>;

    /// Looks up a user and password hash for login.
    async fn get_user_by_email(&self, email: &str) -> Result<UserCredentials, StoreError>;

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;

    /// Stores the SHA-256 digest of an invitation token for `user_id`.
    async fn create_invitation(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Activates the user holding an unexpired invitation and consumes the invitation.
    /// Returns the activated user's id.
    async fn activate_user(&self, token_hash: &str) -> Result<i64, StoreError>;

    /// Owner of a post. The only ownership fact the pipeline needs.
    async fn get_resource_owner(&self, resource_id: i64) -> Result<i64, StoreError>;

    async fn get_post(&self, id: i64) -> Result<Post, StoreError>;

    async fn create_post(&self, post: NewPost) -> Result<Post, StoreError>;

    /// Applies `update` and bumps the version. Fails with [`StoreError::Conflict`]
    /// if the post changed since `expected_version`.
    async fn update_post(
        &self,
        id: i64,
        expected_version: i64,
        update: &PostUpdate,
    ) -> Result<Post, StoreError>;

    async fn delete_post(&self, id: i64) -> Result<(), StoreError>;
}
