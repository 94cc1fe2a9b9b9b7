//! Role resolution and ownership checks.
//!
//! The authorization rule is a disjunction: a principal may act on a resource when it
//! owns the resource **or** its role meets the operation's minimum. The owner of a
//! post can therefore edit and delete it as a plain `user`, while a moderator who does
//! not own it can edit (minimum `moderator`) but not delete (minimum `admin`).
//!
//! User snapshots are resolved through a two-tier lookup: [`UserCache`] first, then the
//! [`Store`] on a miss, repopulating the cache on the way out. Cache failures are
//! already absorbed by [`UserCache`]; store failures are surfaced, because an ownership
//! decision cannot be made from the cache alone. Every store call is bounded by the
//! request's [`Deadline`].

use crate::{
    auth::{AuthError, Principal, Role},
    cache::UserCache,
    error::GatewayError,
    pipeline::Deadline,
    store::{Store, StoreError, User},
};
use std::sync::Arc;
use tracing::{debug, error};

/// Outcome of an ownership check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allowed,
    Denied,
}

pub struct AccessController {
    store: Arc<dyn Store>,
    cache: Arc<UserCache>,
}

impl AccessController {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, cache: Arc<UserCache>) -> Self {
        Self { store, cache }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<UserCache> {
        &self.cache
    }

    /// `Allowed` iff `principal.id == owner_id` or `principal.role >= minimum`.
    #[must_use]
    pub fn authorize_ownership(principal: &Principal, owner_id: i64, minimum: Role) -> Access {
        if principal.id == owner_id || principal.role.satisfies(minimum) {
            Access::Allowed
        } else {
            Access::Denied
        }
    }

    /// [`AccessController::authorize_ownership`] as a `Result`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotOwnerNorAuthorized`] when access is denied.
    pub fn check_ownership(
        principal: &Principal,
        owner_id: i64,
        minimum: Role,
    ) -> Result<(), AuthError> {
        match Self::authorize_ownership(principal, owner_id, minimum) {
            Access::Allowed => Ok(()),
            Access::Denied => Err(AuthError::NotOwnerNorAuthorized),
        }
    }

    /// Role-only check for operations without an owning resource.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InsufficientRole`] when `principal.role < minimum`.
    pub fn require_role(principal: &Principal, minimum: Role) -> Result<(), AuthError> {
        if principal.role.satisfies(minimum) {
            Ok(())
        } else {
            Err(AuthError::InsufficientRole { required: minimum, actual: principal.role })
        }
    }

    /// Two-tier lookup of a user snapshot.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::ResourceNotFound`] if the store has no such user
    /// - [`GatewayError::UpstreamUnavailable`] if the store fails
    /// - [`GatewayError::DeadlineExceeded`] if the deadline passes first
    pub async fn resolve_user(
        &self,
        user_id: i64,
        deadline: Deadline,
    ) -> Result<User, GatewayError> {
        if let Some(user) = deadline.run(self.cache.get(user_id)).await? {
            return Ok(user);
        }

        let user = match deadline.run(self.store.get_user_by_id(user_id)).await? {
            Ok(user) => user,
            Err(StoreError::NotFound(what)) => return Err(GatewayError::ResourceNotFound(what)),
            Err(e) => {
                error!(user_id, error = %e, "store lookup failed");
                return Err(e.into());
            }
        };

        debug!(user_id, "user loaded from store");
        // The caller already has what it needs; a slow cache write must not fail it.
        let _ = deadline.run(self.cache.put(&user)).await;
        Ok(user)
    }

    /// Role of `user_id`, via the two-tier lookup.
    ///
    /// # Errors
    ///
    /// See [`AccessController::resolve_user`].
    pub async fn resolve_principal_role(
        &self,
        user_id: i64,
        deadline: Deadline,
    ) -> Result<Role, GatewayError> {
        Ok(self.resolve_user(user_id, deadline).await?.role)
    }

    /// Owner id of a resource, read from the store.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::ResourceNotFound`] if the resource does not exist
    /// - [`GatewayError::UpstreamUnavailable`] if the store fails
    /// - [`GatewayError::DeadlineExceeded`] if the deadline passes first
    pub async fn resource_owner(
        &self,
        resource_id: i64,
        deadline: Deadline,
    ) -> Result<i64, GatewayError> {
        deadline.run(self.store.get_resource_owner(resource_id)).await?.map_err(|e| {
            if !matches!(e, StoreError::NotFound(_)) {
                error!(resource_id, error = %e, "resource owner lookup failed");
            }
            e.into()
        })
    }

    /// Drops a cached snapshot after the user record changed.
    pub async fn invalidate_user(&self, user_id: i64) {
        self.cache.invalidate(user_id).await;
    }
}
