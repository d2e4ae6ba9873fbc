use anyhow::Result;
use quill_llm::CompletionClient;
use quill_persist::{PrincipalStore, ThreadStore};
use quill_pipeline::{InMemoryRateLimiter, MessagePipeline, RateLimitConfig, RetryPolicy};
use std::sync::Arc;

use crate::auth::IdentityProvider;
use crate::config::Config;

/// Shared application state passed to all handlers
///
/// All resources are wrapped in Arc for sharing across async tasks. The
/// pipeline (and its rate limiter) is created once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub threads: Arc<dyn ThreadStore>,
    pub principals: Arc<dyn PrincipalStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub pipeline: Arc<MessagePipeline>,
}

impl AppState {
    pub fn new(
        config: Config,
        threads: Arc<dyn ThreadStore>,
        principals: Arc<dyn PrincipalStore>,
        identity: Arc<dyn IdentityProvider>,
        completion: Arc<dyn CompletionClient>,
    ) -> Result<Self> {
        let pipeline = MessagePipeline::builder()
            .thread_store(threads.clone())
            .principal_store(principals.clone())
            .completion_client(completion)
            .rate_limiter(Arc::new(InMemoryRateLimiter::new(RateLimitConfig::from(
                &config.rate_limit,
            ))))
            .retry_policy(RetryPolicy::from(&config.persistence))
            .config(config.pipeline_config())
            .build()?;

        Ok(Self {
            config: Arc::new(config),
            threads,
            principals,
            identity,
            pipeline: Arc::new(pipeline),
        })
    }
}
