use crate::{
    error::GatewayError,
    pipeline::{Next, Reply, RequestScope, Stage},
    store::{Store, StoreError},
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::error;

/// Loads the post named by the scope's resource id and attaches it.
///
/// Runs after authentication so unknown callers cannot learn which ids exist.
pub struct PostContextStage {
    store: Arc<dyn Store>,
}

impl PostContextStage {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Stage for PostContextStage {
    fn name(&self) -> &'static str {
        "post_context"
    }

    async fn handle(&self, mut scope: RequestScope, next: Next<'_>) -> Result<Reply, GatewayError> {
        let post_id = scope.resource_id()?;

        let post = match scope.deadline.run(self.store.get_post(post_id)).await? {
            Ok(post) => post,
            Err(StoreError::NotFound(_)) => {
                return Err(GatewayError::ResourceNotFound(format!("post {post_id}")));
            }
            Err(e) => {
                error!(post_id, error = %e, "failed to load post");
                return Err(e.into());
            }
        };

        scope.set_post(post);
        next.run(scope).await
    }
}
