use crate::{
    auth::BasicCredentials,
    error::GatewayError,
    pipeline::{Next, Reply, RequestScope, Stage},
};
use async_trait::async_trait;
use std::sync::Arc;

/// Guards operational endpoints with static HTTP Basic credentials.
pub struct BasicAuthStage {
    credentials: Arc<BasicCredentials>,
}

impl BasicAuthStage {
    #[must_use]
    pub fn new(credentials: Arc<BasicCredentials>) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl Stage for BasicAuthStage {
    fn name(&self) -> &'static str {
        "basic_auth"
    }

    async fn handle(&self, scope: RequestScope, next: Next<'_>) -> Result<Reply, GatewayError> {
        if let Err(e) = self.credentials.verify(scope.authorization.as_deref()) {
            tracing::warn!(client = %scope.client_key, "basic authentication failed");
            return Err(e.into());
        }
        next.run(scope).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::{
        auth::AuthError,
        pipeline::{handler_fn, Deadline, Pipeline},
    };
    use std::time::Duration;

    fn pipeline(credentials: Arc<BasicCredentials>) -> Pipeline {
        Pipeline::builder()
            .stage(Arc::new(BasicAuthStage::new(credentials)))
            .handler(Arc::new(handler_fn(|_scope| async { Ok(Reply::no_content()) })))
    }

    fn scope() -> RequestScope {
        RequestScope::new("127.0.0.1", Deadline::after(Duration::from_secs(5)))
    }

    #[tokio::test]
    async fn test_correct_credentials_pass() {
        let credentials = Arc::new(BasicCredentials::new("admin", "hunter2"));
        let pipeline = pipeline(credentials.clone());

        let reply = pipeline.execute(scope().with_authorization(credentials.header_value())).await;
        assert_eq!(reply.unwrap().status, 204);
    }

    #[tokio::test]
    async fn test_wrong_or_missing_credentials_rejected() {
        let pipeline = pipeline(Arc::new(BasicCredentials::new("admin", "hunter2")));
        let wrong = BasicCredentials::new("admin", "hunter3").header_value();

        for scope in [scope(), scope().with_authorization(wrong)] {
            let err = pipeline.execute(scope).await.unwrap_err();
            assert!(matches!(err, GatewayError::Auth(AuthError::InvalidCredentials)));
            assert_eq!(err.status_code(), 401);
        }
    }
}
