use super::{NewPost, NewUser, Post, PostUpdate, Store, StoreError, User, UserCredentials};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

/// In-memory [`Store`]. Every operation takes the lock once, so each call is atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<i64, UserCredentials>,
    posts: HashMap<i64, Post>,
    invitations: HashMap<String, (i64, DateTime<Utc>)>,
    next_user_id: i64,
    next_post_id: i64,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn user_count(&self) -> usize {
        self.inner.read().users.len()
    }

    #[must_use]
    pub fn post_count(&self) -> usize {
        self.inner.read().posts.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_user_by_id(&self, id: i64) -> Result<User, StoreError> {
        self.inner
            .read()
            .users
            .get(&id)
            .map(|creds| creds.user.clone())
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<UserCredentials, StoreError> {
        self.inner
            .read()
            .users
            .values()
            .find(|creds| creds.user.email.eq_ignore_ascii_case(email))
            .cloned()
            .ok_or_else(|| StoreError::NotFound("user".to_string()))
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.write();

        let taken = inner.users.values().any(|c| {
            c.user.email.eq_ignore_ascii_case(&user.email) || c.user.username == user.username
        });
        if taken {
            return Err(StoreError::Conflict("username or email already registered".to_string()));
        }

        inner.next_user_id += 1;
        let created = User {
            id: inner.next_user_id,
            username: user.username,
            email: user.email,
            role: user.role,
            is_active: user.is_active,
            created_at: Utc::now(),
        };
        inner.users.insert(
            created.id,
            UserCredentials { user: created.clone(), password_hash: user.password_hash },
        );

        Ok(created)
    }

    async fn create_invitation(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if !inner.users.contains_key(&user_id) {
            return Err(StoreError::NotFound(format!("user {user_id}")));
        }
        inner.invitations.insert(token_hash.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn activate_user(&self, token_hash: &str) -> Result<i64, StoreError> {
        let mut inner = self.inner.write();
        let now = Utc::now();

        let user_id = match inner.invitations.get(token_hash) {
            Some((user_id, expires_at)) if *expires_at > now => *user_id,
            _ => return Err(StoreError::NotFound("invitation".to_string())),
        };

        let creds = inner
            .users
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::NotFound(format!("user {user_id}")))?;
        creds.user.is_active = true;

        inner.invitations.retain(|_, (id, _)| *id != user_id);
        Ok(user_id)
    }

    async fn get_resource_owner(&self, resource_id: i64) -> Result<i64, StoreError> {
        self.inner
            .read()
            .posts
            .get(&resource_id)
            .map(|post| post.user_id)
            .ok_or_else(|| StoreError::NotFound(format!("post {resource_id}")))
    }

    async fn get_post(&self, id: i64) -> Result<Post, StoreError> {
        self.inner
            .read()
            .posts
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("post {id}")))
    }

    async fn create_post(&self, post: NewPost) -> Result<Post, StoreError> {
        let mut inner = self.inner.write();
        if !inner.users.contains_key(&post.user_id) {
            return Err(StoreError::NotFound(format!("user {}", post.user_id)));
        }

        inner.next_post_id += 1;
        let now = Utc::now();
        let created = Post {
            id: inner.next_post_id,
            user_id: post.user_id,
            title: post.title,
            content: post.content,
            tags: post.tags,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        inner.posts.insert(created.id, created.clone());

        Ok(created)
    }

    async fn update_post(
        &self,
        id: i64,
        expected_version: i64,
        update: &PostUpdate,
    ) -> Result<Post, StoreError> {
        let mut inner = self.inner.write();
        let post =
            inner.posts.get_mut(&id).ok_or_else(|| StoreError::NotFound(format!("post {id}")))?;

        if post.version != expected_version {
            return Err(StoreError::Conflict(format!("post {id} was modified concurrently")));
        }

        update.apply(post, Utc::now());
        Ok(post.clone())
    }

    async fn delete_post(&self, id: i64) -> Result<(), StoreError> {
        self.inner
            .write()
            .posts
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("post {id}")))
    }
}
