use crate::{
    access::AccessController,
    auth::{AuthError, Principal, TokenAuthenticator},
    error::GatewayError,
    pipeline::{Next, Reply, RequestScope, Stage},
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Validates the bearer token and attaches the caller's [`Principal`].
///
/// The token names only the subject. The role comes from the user record, resolved
/// through the cache-aside lookup, so a role change takes effect as soon as the
/// cached snapshot is invalidated or expires.
pub struct AuthenticateStage {
    tokens: Arc<TokenAuthenticator>,
    access: Arc<AccessController>,
}

impl AuthenticateStage {
    #[must_use]
    pub fn new(tokens: Arc<TokenAuthenticator>, access: Arc<AccessController>) -> Self {
        Self { tokens, access }
    }
}

#[async_trait]
impl Stage for AuthenticateStage {
    fn name(&self) -> &'static str {
        "authenticate"
    }

    async fn handle(&self, mut scope: RequestScope, next: Next<'_>) -> Result<Reply, GatewayError> {
        let claims = match TokenAuthenticator::bearer(scope.authorization.as_deref())
            .and_then(|token| self.tokens.validate(token))
        {
            Ok(claims) => claims,
            Err(e) => {
                warn!(client = %scope.client_key, error = %e, "authentication failed");
                return Err(e.into());
            }
        };
        let user_id = claims.subject_id()?;

        let user = match self.access.resolve_user(user_id, scope.deadline).await {
            Ok(user) => user,
            Err(GatewayError::ResourceNotFound(_)) => {
                warn!(user_id, "token subject does not exist");
                return Err(AuthError::InvalidToken("unknown subject".to_string()).into());
            }
            Err(e) => return Err(e),
        };

        if !user.is_active {
            warn!(user_id, "inactive account presented a token");
            return Err(AuthError::InactiveAccount.into());
        }

        debug!(user_id, role = %user.role, "authenticated");
        scope.set_principal(Principal::new(user.id, user.role));
        next.run(scope).await
    }
}
