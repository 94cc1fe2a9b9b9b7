use super::{NewPost, NewUser, Post, PostUpdate, Store, StoreError, User, UserCredentials};
use crate::{auth::Role, config::StoreConfig};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{str::FromStr, time::Duration};

/// Tables the store reads and writes. Safe to run repeatedly.
pub const SCHEMA: &str = r"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE COLLATE NOCASE,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'user',
        is_active BOOLEAN NOT NULL DEFAULT 0,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS posts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        tags TEXT NOT NULL DEFAULT '[]',
        version INTEGER NOT NULL DEFAULT 0,
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS user_invitations (
        token_hash TEXT PRIMARY KEY,
        user_id INTEGER NOT NULL,
        expires_at TIMESTAMP NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_posts_user_id ON posts(user_id);
    CREATE INDEX IF NOT EXISTS idx_invitations_user_id ON user_invitations(user_id);
";

pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Connects to `database_url`, creating the database file if missing.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the URL is invalid or the connection fails.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// # Errors
    ///
    /// Returns `StoreError::Database` if the connection fails.
    pub async fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        Self::connect(&config.database_url, config.max_connections).await
    }

    #[must_use]
    pub fn from_pool(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Creates tables and indexes that do not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if a statement fails.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Extracts a non-nullable field from a database row.
    fn get_required<'r, T>(row: &'r SqliteRow, column: &str) -> Result<T, StoreError>
    where
        T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
    {
        row.try_get::<T, _>(column)
            .map_err(|e| StoreError::Database(format!("column '{column}': {e}")))
    }

    fn get_timestamp(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>, StoreError> {
        let naive: NaiveDateTime = Self::get_required(row, column)?;
        Ok(DateTime::from_naive_utc_and_offset(naive, Utc))
    }

    fn row_to_user(row: &SqliteRow) -> Result<User, StoreError> {
        let role: String = Self::get_required(row, "role")?;
        Ok(User {
            id: Self::get_required(row, "id")?,
            username: Self::get_required(row, "username")?,
            email: Self::get_required(row, "email")?,
            role: Role::parse(&role)
                .ok_or_else(|| StoreError::Database(format!("unknown role '{role}'")))?,
            is_active: Self::get_required(row, "is_active")?,
            created_at: Self::get_timestamp(row, "created_at")?,
        })
    }

    fn row_to_post(row: &SqliteRow) -> Result<Post, StoreError> {
        let tags: String = Self::get_required(row, "tags")?;
        Ok(Post {
            id: Self::get_required(row, "id")?,
            user_id: Self::get_required(row, "user_id")?,
            title: Self::get_required(row, "title")?,
            content: Self::get_required(row, "content")?,
            tags: serde_json::from_str(&tags)
                .map_err(|e| StoreError::Database(format!("column 'tags': {e}")))?,
            version: Self::get_required(row, "version")?,
            created_at: Self::get_timestamp(row, "created_at")?,
            updated_at: Self::get_timestamp(row, "updated_at")?,
        })
    }

    fn encode_tags(tags: &[String]) -> Result<String, StoreError> {
        serde_json::to_string(tags).map_err(|e| StoreError::Database(e.to_string()))
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_user_by_id(&self, id: i64) -> Result<User, StoreError> {
        let row = sqlx::query(
            r"
            SELECT id, username, email, role, is_active, created_at
            FROM users
            WHERE id = ?
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("user {id}")))?;

        Self::row_to_user(&row)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<UserCredentials, StoreError> {
        let row = sqlx::query(
            r"
            SELECT id, username, email, role, is_active, created_at, password_hash
            FROM users
            WHERE email = ?
            ",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound("user".to_string()))?;

        Ok(UserCredentials {
            user: Self::row_to_user(&row)?,
            password_hash: Self::get_required(&row, "password_hash")?,
        })
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query(
            r"
            INSERT INTO users (username, email, password_hash, role, is_active)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, username, email, role, is_active, created_at
            ",
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_user(&row)
    }

    async fn create_invitation(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO user_invitations (token_hash, user_id, expires_at)
            VALUES (?, ?, ?)
            ",
        )
        .bind(token_hash)
        .bind(user_id)
        .bind(expires_at.naive_utc())
        .execute(&self.pool)
        .await
        .map_err(|e| match StoreError::from(e) {
            StoreError::NotFound(_) => StoreError::NotFound(format!("user {user_id}")),
            other => other,
        })?;

        Ok(())
    }

    async fn activate_user(&self, token_hash: &str) -> Result<i64, StoreError> {
        let mut tx = self.pool.begin().await?;

        let user_id: i64 = sqlx::query(
            r"
            SELECT user_id FROM user_invitations
            WHERE token_hash = ? AND expires_at > ?
            ",
        )
        .bind(token_hash)
        .bind(Utc::now().naive_utc())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::NotFound("invitation".to_string()))?
        .try_get("user_id")?;

        sqlx::query("UPDATE users SET is_active = 1 WHERE id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM user_invitations WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(user_id)
    }

    async fn get_resource_owner(&self, resource_id: i64) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT user_id FROM posts WHERE id = ?")
            .bind(resource_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("post {resource_id}")))?;

        Self::get_required(&row, "user_id")
    }

    async fn get_post(&self, id: i64) -> Result<Post, StoreError> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, title, content, tags, version, created_at, updated_at
            FROM posts
            WHERE id = ?
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("post {id}")))?;

        Self::row_to_post(&row)
    }

    async fn create_post(&self, post: NewPost) -> Result<Post, StoreError> {
        let row = sqlx::query(
            r"
            INSERT INTO posts (user_id, title, content, tags)
            VALUES (?, ?, ?, ?)
            RETURNING id, user_id, title, content, tags, version, created_at, updated_at
            ",
        )
        .bind(post.user_id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(Self::encode_tags(&post.tags)?)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match StoreError::from(e) {
            StoreError::NotFound(_) => StoreError::NotFound(format!("user {}", post.user_id)),
            other => other,
        })?;

        Self::row_to_post(&row)
    }

    async fn update_post(
        &self,
        id: i64,
        expected_version: i64,
        update: &PostUpdate,
    ) -> Result<Post, StoreError> {
        let tags = update.tags.as_deref().map(Self::encode_tags).transpose()?;

        let row = sqlx::query(
            r"
            UPDATE posts
            SET title = COALESCE(?, title),
                content = COALESCE(?, content),
                tags = COALESCE(?, tags),
                version = version + 1,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ? AND version = ?
            RETURNING id, user_id, title, content, tags, version, created_at, updated_at
            ",
        )
        .bind(update.title.as_deref())
        .bind(update.content.as_deref())
        .bind(tags)
        .bind(id)
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_post(&row),
            None => {
                // Distinguish a missing post from a stale version.
                self.get_post(id).await?;
                Err(StoreError::Conflict(format!("post {id} was modified concurrently")))
            }
        }
    }

    async fn delete_post(&self, id: i64) -> Result<(), StoreError> {
        let result =
            sqlx::query("DELETE FROM posts WHERE id = ?").bind(id).execute(&self.pool).await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("post {id}")));
        }
        Ok(())
    }
}
