//! Shared services and the per-route pipelines composed from them.
//!
//! Chains are assembled once here; request handling only executes them.
//!
//! | Route                              | Chain                                              |
//! |------------------------------------|----------------------------------------------------|
//! | `GET /v1/health`                   | rate limit                                         |
//! | `POST /v1/authentication/token`    | rate limit                                         |
//! | `PUT /v1/users/activate/{token}`   | rate limit                                         |
//! | `GET /v1/users/{userID}`           | rate limit, authenticate                           |
//! | `GET /v1/posts/{postID}`           | rate limit, authenticate, post context             |
//! | `PATCH /v1/posts/{postID}`         | ... then authorize (owner or at least moderator)   |
//! | `DELETE /v1/posts/{postID}`        | ... then authorize (owner or at least admin)       |
//! | `GET /v1/debug/vars`               | basic auth                                         |

use crate::handlers::{
    ActivateUser, DebugVars, DeletePost, GetPost, GetUser, Health, IssueToken, UpdatePost,
};
use std::{sync::Arc, time::Instant};
use warden_core::{
    access::AccessController,
    auth::{AuthError, BasicCredentials, Role, TokenAuthenticator},
    cache::{CacheBackend, UserCache},
    config::AppConfig,
    middleware::{
        AuthenticateStage, AuthorizeStage, BasicAuthStage, PostContextStage, RateLimitStage,
        RateLimiter,
    },
    pipeline::{Pipeline, Stage},
    store::Store,
};

/// Long-lived collaborators shared by every request.
pub struct Services {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub cache: Arc<UserCache>,
    pub access: Arc<AccessController>,
    pub tokens: Arc<TokenAuthenticator>,
    pub limiter: Arc<RateLimiter>,
    pub basic: Arc<BasicCredentials>,
    pub started_at: Instant,
}

impl Services {
    /// # Errors
    ///
    /// Returns [`AuthError::SigningError`] if no token secret is configured.
    pub fn from_config(
        config: AppConfig,
        store: Arc<dyn Store>,
        cache_backend: Arc<dyn CacheBackend>,
    ) -> Result<Self, AuthError> {
        let tokens = Arc::new(TokenAuthenticator::from_config(&config.auth.token)?);
        let cache = Arc::new(UserCache::from_config(&config.cache, cache_backend));
        let access = Arc::new(AccessController::new(store.clone(), cache.clone()));
        let limiter = Arc::new(RateLimiter::from_config(&config.rate_limiter));
        let basic =
            Arc::new(BasicCredentials::new(&config.auth.basic.user, &config.auth.basic.pass));

        Ok(Self {
            config: Arc::new(config),
            store,
            cache,
            access,
            tokens,
            limiter,
            basic,
            started_at: Instant::now(),
        })
    }
}

pub struct Routes {
    pub health: Pipeline,
    pub debug_vars: Pipeline,
    pub issue_token: Pipeline,
    pub activate_user: Pipeline,
    pub get_user: Pipeline,
    pub get_post: Pipeline,
    pub update_post: Pipeline,
    pub delete_post: Pipeline,
}

impl Routes {
    #[must_use]
    pub fn new(services: &Services) -> Self {
        let rate_limit: Arc<dyn Stage> = Arc::new(RateLimitStage::new(services.limiter.clone()));
        let authenticate: Arc<dyn Stage> =
            Arc::new(AuthenticateStage::new(services.tokens.clone(), services.access.clone()));
        let post_context: Arc<dyn Stage> =
            Arc::new(PostContextStage::new(services.store.clone()));

        let public = || Pipeline::builder().stage(rate_limit.clone());
        let authenticated = || public().stage(authenticate.clone());
        let with_post = || authenticated().stage(post_context.clone());

        Self {
            health: public().handler(Arc::new(Health::new(&services.config.environment))),
            debug_vars: Pipeline::builder()
                .stage(Arc::new(BasicAuthStage::new(services.basic.clone())))
                .handler(Arc::new(DebugVars::new(
                    services.limiter.clone(),
                    services.cache.clone(),
                    services.started_at,
                ))),
            issue_token: public().handler(Arc::new(IssueToken::new(
                services.store.clone(),
                services.tokens.clone(),
            ))),
            activate_user: public().handler(Arc::new(ActivateUser::new(services.access.clone()))),
            get_user: authenticated().handler(Arc::new(GetUser::new(services.access.clone()))),
            get_post: with_post().handler(Arc::new(GetPost)),
            update_post: with_post()
                .stage(Arc::new(AuthorizeStage::owner_or_role(
                    services.access.clone(),
                    Role::Moderator,
                )))
                .handler(Arc::new(UpdatePost::new(services.store.clone()))),
            delete_post: with_post()
                .stage(Arc::new(AuthorizeStage::owner_or_role(
                    services.access.clone(),
                    Role::Admin,
                )))
                .handler(Arc::new(DeletePost::new(services.store.clone()))),
        }
    }
}

/// Axum state: cheap to clone, one per router.
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
    pub routes: Arc<Routes>,
}

impl AppState {
    #[must_use]
    pub fn new(services: Services) -> Self {
        let routes = Routes::new(&services);
        Self { services: Arc::new(services), routes: Arc::new(routes) }
    }
}
