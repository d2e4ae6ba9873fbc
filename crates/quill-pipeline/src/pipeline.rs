use anyhow::{anyhow, Result as AnyResult};
use quill_llm::{
    CompletionClient, CompletionRequest, GenerationConfig, TokenUsage, DEFAULT_RETRY_AFTER_SECS,
};
use quill_persist::{PrincipalStore, ThreadStore, Turn};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::committer::{PersistenceCommitter, RetryPolicy};
use crate::credit::{CreditGate, CreditLedger, TurnKind};
use crate::error::{PipelineError, Result};
use crate::history::project;
use crate::rate_limit::{InMemoryRateLimiter, RateLimiter};
use crate::validate::{validate, MessageRequest};

/// Steps of one message exchange, in the only order they can happen
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Received,
    RateChecked,
    Validated,
    CreditChecked,
    ThreadLoaded,
    UserTurnAppended,
    CompletionRequested,
    CompletionReceived,
    Persisted,
    CreditCharged,
    Responded,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::RateChecked => "rate_checked",
            Stage::Validated => "validated",
            Stage::CreditChecked => "credit_checked",
            Stage::ThreadLoaded => "thread_loaded",
            Stage::UserTurnAppended => "user_turn_appended",
            Stage::CompletionRequested => "completion_requested",
            Stage::CompletionReceived => "completion_received",
            Stage::Persisted => "persisted",
            Stage::CreditCharged => "credit_charged",
            Stage::Responded => "responded",
        };
        f.write_str(name)
    }
}

/// Tracks and logs the stage reached by one exchange
struct Progress<'a> {
    principal_id: &'a str,
    stage: Stage,
    started: Instant,
}

impl<'a> Progress<'a> {
    fn new(principal_id: &'a str) -> Self {
        debug!(principal_id = %principal_id, stage = %Stage::Received, "Pipeline stage");
        Self {
            principal_id,
            stage: Stage::Received,
            started: Instant::now(),
        }
    }

    fn advance(&mut self, next: Stage) {
        debug_assert!(next > self.stage, "stage {} after {}", next, self.stage);
        self.stage = next;
        debug!(principal_id = %self.principal_id, stage = %next, "Pipeline stage");
    }

    fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub model: String,
    pub generation: GenerationConfig,
    /// Upper bound on the completion call
    pub completion_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-flash".to_string(),
            generation: GenerationConfig::default(),
            completion_timeout: Duration::from_secs(60),
        }
    }
}

/// Result of a successful exchange
#[derive(Debug, Clone)]
pub struct MessageOutcome {
    pub chat_id: String,
    pub reply: Turn,
    /// Balance after the charge, or the balance read at the gate when the
    /// charge could not be applied
    pub credits_remaining: u64,
    pub charged: bool,
    pub usage: Option<TokenUsage>,
}

/// Credit-gated message exchange.
///
/// Nothing is written before the completion returns, so every failure up to
/// and including the completion call (or dropping the future while it is in
/// flight) leaves the store and the balance untouched.
pub struct MessagePipeline {
    rate_limiter: Arc<dyn RateLimiter>,
    threads: Arc<dyn ThreadStore>,
    gate: CreditGate,
    ledger: CreditLedger,
    committer: PersistenceCommitter,
    completion: Arc<dyn CompletionClient>,
    config: PipelineConfig,
}

impl MessagePipeline {
    pub fn builder() -> MessagePipelineBuilder {
        MessagePipelineBuilder::new()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run a text exchange for an authenticated principal
    pub async fn send_text(
        &self,
        principal_id: &str,
        request: &MessageRequest,
    ) -> Result<MessageOutcome> {
        let mut progress = Progress::new(principal_id);
        let result = self.run_text(&mut progress, request).await;

        match &result {
            Ok(outcome) => info!(
                principal_id = %principal_id,
                chat_id = %outcome.chat_id,
                credits_remaining = outcome.credits_remaining,
                duration_ms = progress.elapsed_ms() as u64,
                "Message exchange completed"
            ),
            Err(e) if progress.stage >= Stage::CompletionReceived => error!(
                principal_id = %principal_id,
                stage = %progress.stage,
                kind = e.kind(),
                error = %e,
                "Message exchange failed after completion"
            ),
            Err(e) => info!(
                principal_id = %principal_id,
                stage = %progress.stage,
                kind = e.kind(),
                error = %e,
                "Message exchange rejected"
            ),
        }

        progress.advance(Stage::Responded);
        result
    }

    async fn run_text(
        &self,
        progress: &mut Progress<'_>,
        request: &MessageRequest,
    ) -> Result<MessageOutcome> {
        let principal_id = progress.principal_id;

        self.rate_limiter
            .check(principal_id)
            .await
            .map_err(|e| PipelineError::RateLimited {
                retry_after_secs: e.retry_after_secs,
            })?;
        progress.advance(Stage::RateChecked);

        let message = validate(request).map_err(PipelineError::Validation)?;
        progress.advance(Stage::Validated);

        let kind = TurnKind::Text;
        let principal = self.gate.authorize(principal_id, kind).await?;
        progress.advance(Stage::CreditChecked);

        let base = self
            .threads
            .find_thread(&message.chat_id, principal_id)
            .await?
            .ok_or(PipelineError::NotFound)?;
        progress.advance(Stage::ThreadLoaded);

        let user_turn = Turn::user(message.prompt);
        let mut working = base.clone();
        working.append(user_turn.clone());
        progress.advance(Stage::UserTurnAppended);

        let context = project(&working)?;
        let completion_request = CompletionRequest::new(
            self.config.model.clone(),
            context.history,
            context.prompt,
        )
        .with_config(self.config.generation.clone());
        progress.advance(Stage::CompletionRequested);

        let completion = tokio::time::timeout(
            self.config.completion_timeout,
            self.completion.complete(completion_request),
        )
        .await
        .map_err(|_| {
            warn!(
                principal_id = %principal_id,
                provider = self.completion.provider(),
                timeout_secs = self.config.completion_timeout.as_secs(),
                "Completion call timed out"
            );
            PipelineError::UpstreamUnavailable {
                reason: "completion service did not answer in time".to_string(),
                retry_after_secs: DEFAULT_RETRY_AFTER_SECS,
            }
        })??;
        progress.advance(Stage::CompletionReceived);

        let reply = Turn::assistant(completion.text);
        let saved = self
            .committer
            .commit(base, &[user_turn, reply.clone()])
            .await?;
        progress.advance(Stage::Persisted);

        let charged = self.ledger.charge(principal_id, kind).await;
        progress.advance(Stage::CreditCharged);

        // The committed copy carries the clamped timestamp
        let reply = saved.last_turn().cloned().unwrap_or(reply);

        Ok(MessageOutcome {
            chat_id: saved.id,
            reply,
            credits_remaining: charged.unwrap_or(principal.credits),
            charged: charged.is_some(),
            usage: completion.usage,
        })
    }
}

pub struct MessagePipelineBuilder {
    rate_limiter: Option<Arc<dyn RateLimiter>>,
    thread_store: Option<Arc<dyn ThreadStore>>,
    principal_store: Option<Arc<dyn PrincipalStore>>,
    completion_client: Option<Arc<dyn CompletionClient>>,
    retry_policy: RetryPolicy,
    config: PipelineConfig,
}

impl MessagePipelineBuilder {
    pub fn new() -> Self {
        Self {
            rate_limiter: None,
            thread_store: None,
            principal_store: None,
            completion_client: None,
            retry_policy: RetryPolicy::default(),
            config: PipelineConfig::default(),
        }
    }

    /// Defaults to an [`InMemoryRateLimiter`] with a 60s window and 10 requests
    pub fn rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    pub fn thread_store(mut self, store: Arc<dyn ThreadStore>) -> Self {
        self.thread_store = Some(store);
        self
    }

    pub fn principal_store(mut self, store: Arc<dyn PrincipalStore>) -> Self {
        self.principal_store = Some(store);
        self
    }

    pub fn completion_client(mut self, client: Arc<dyn CompletionClient>) -> Self {
        self.completion_client = Some(client);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> AnyResult<MessagePipeline> {
        let threads = self
            .thread_store
            .ok_or_else(|| anyhow!("Thread store is required"))?;
        let principals = self
            .principal_store
            .ok_or_else(|| anyhow!("Principal store is required"))?;
        let completion = self
            .completion_client
            .ok_or_else(|| anyhow!("Completion client is required"))?;
        let rate_limiter = self
            .rate_limiter
            .unwrap_or_else(|| Arc::new(InMemoryRateLimiter::default()));

        Ok(MessagePipeline {
            rate_limiter,
            committer: PersistenceCommitter::new(threads.clone(), self.retry_policy),
            threads,
            gate: CreditGate::new(principals.clone()),
            ledger: CreditLedger::new(principals),
            completion,
            config: self.config,
        })
    }
}

impl Default for MessagePipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
