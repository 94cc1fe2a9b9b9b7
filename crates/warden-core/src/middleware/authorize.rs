use crate::{
    access::AccessController,
    auth::Role,
    error::GatewayError,
    pipeline::{Next, Reply, RequestScope, Stage},
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// What an operation demands of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// The caller owns the target resource or holds at least this role.
    OwnerOrRole(Role),
    /// The caller holds at least this role, regardless of ownership.
    Role(Role),
}

/// Enforces a [`Requirement`] against the authenticated principal.
///
/// For ownership checks the owner is taken from the post attached by
/// [`PostContextStage`](super::PostContextStage); without one it is read from the store.
pub struct AuthorizeStage {
    access: Arc<AccessController>,
    requirement: Requirement,
}

impl AuthorizeStage {
    #[must_use]
    pub fn new(access: Arc<AccessController>, requirement: Requirement) -> Self {
        Self { access, requirement }
    }

    #[must_use]
    pub fn owner_or_role(access: Arc<AccessController>, minimum: Role) -> Self {
        Self::new(access, Requirement::OwnerOrRole(minimum))
    }

    #[must_use]
    pub fn role(access: Arc<AccessController>, minimum: Role) -> Self {
        Self::new(access, Requirement::Role(minimum))
    }

    #[must_use]
    pub fn requirement(&self) -> Requirement {
        self.requirement
    }
}

#[async_trait]
impl Stage for AuthorizeStage {
    fn name(&self) -> &'static str {
        "authorize"
    }

    async fn handle(&self, scope: RequestScope, next: Next<'_>) -> Result<Reply, GatewayError> {
        let principal = *scope.principal()?;

        let outcome = match self.requirement {
            Requirement::Role(minimum) => AccessController::require_role(&principal, minimum),
            Requirement::OwnerOrRole(minimum) => {
                let owner_id = match scope.post() {
                    Some(post) => post.user_id,
                    None => {
                        let resource_id = scope.resource_id()?;
                        self.access.resource_owner(resource_id, scope.deadline).await?
                    }
                };
                AccessController::check_ownership(&principal, owner_id, minimum)
            }
        };

        if let Err(e) = outcome {
            warn!(user_id = principal.id, role = %principal.role, error = %e, "access denied");
            return Err(e.into());
        }
        next.run(scope).await
    }
}
