use async_trait::async_trait;
use quill_llm::{Completion, CompletionClient, CompletionError, CompletionRequest, ModelRole};
use quill_persist::{
    ChatThread, DebitOutcome, InMemoryStore, PersistError, Principal, PrincipalStore, ThreadStore,
    Turn, TurnRole,
};
use quill_pipeline::{
    InMemoryRateLimiter, MessagePipeline, MessageRequest, PipelineConfig, PipelineError,
    RateLimitConfig, RetryPolicy,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Completion client that replays scripted answers and records requests
#[derive(Default)]
struct ScriptedClient {
    answers: Mutex<VecDeque<Result<String, CompletionError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    delay: Option<Duration>,
}

impl ScriptedClient {
    fn replying(texts: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(texts.iter().map(|t| Ok(t.to_string())).collect()),
            ..Default::default()
        })
    }

    fn failing(err: CompletionError) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(VecDeque::from(vec![Err(err)])),
            ..Default::default()
        })
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(VecDeque::from(vec![Ok("late".to_string())])),
            delay: Some(delay),
            ..Default::default()
        })
    }

    fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    fn provider(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, CompletionError> {
        self.requests.lock().unwrap().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let answer = self
            .answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(CompletionError::EmptyCompletion));
        answer.map(|text| Completion {
            text,
            usage: None,
            finish_reason: Some("STOP".to_string()),
        })
    }
}

struct Fixture {
    store: Arc<InMemoryStore>,
    client: Arc<ScriptedClient>,
    pipeline: MessagePipeline,
}

async fn fixture(credits: u64, client: Arc<ScriptedClient>) -> Fixture {
    fixture_with(credits, client, PipelineConfig::default()).await
}

async fn fixture_with(credits: u64, client: Arc<ScriptedClient>, config: PipelineConfig) -> Fixture {
    let store = Arc::new(InMemoryStore::new());
    store.insert_principal(Principal::new("alice", "Alice", credits)).await;
    store.insert_principal(Principal::new("mallory", "Mallory", 10)).await;

    let pipeline = MessagePipeline::builder()
        .thread_store(store.clone())
        .principal_store(store.clone())
        .completion_client(client.clone())
        .rate_limiter(Arc::new(InMemoryRateLimiter::new(RateLimitConfig::default())))
        .retry_policy(RetryPolicy::new(3, Duration::from_millis(1)))
        .config(config)
        .build()
        .unwrap();

    Fixture {
        store,
        client,
        pipeline,
    }
}

async fn new_chat(store: &InMemoryStore, owner: &str) -> ChatThread {
    store.create_thread(owner, owner, "New chat").await.unwrap()
}

async fn credits(store: &InMemoryStore, id: &str) -> u64 {
    store.get_principal(id).await.unwrap().unwrap().credits
}

#[tokio::test]
async fn scenario_first_message_is_answered_and_charged() {
    let fx = fixture(1, ScriptedClient::replying(&["Hi there"])).await;
    let chat = new_chat(&fx.store, "alice").await;

    let outcome = fx
        .pipeline
        .send_text("alice", &MessageRequest::new(chat.id.clone(), "Hello"))
        .await
        .unwrap();

    assert_eq!(outcome.reply.content, "Hi there");
    assert_eq!(outcome.reply.role, TurnRole::Assistant);
    assert!(!outcome.reply.is_image);
    assert_eq!(outcome.chat_id, chat.id);
    assert_eq!(outcome.credits_remaining, 0);
    assert!(outcome.charged);
    assert_eq!(credits(&fx.store, "alice").await, 0);

    let stored = fx.store.snapshot_thread(&chat.id).await.unwrap();
    let contents: Vec<&str> = stored.turns().iter().map(|t| t.content.as_str()).collect();
    assert_eq!(contents, vec!["Hello", "Hi there"]);
    assert_eq!(stored.version, 1);
}

#[tokio::test]
async fn scenario_no_credits_leaves_thread_untouched() {
    let fx = fixture(0, ScriptedClient::replying(&["unused"])).await;
    let chat = new_chat(&fx.store, "alice").await;

    let err = fx
        .pipeline
        .send_text("alice", &MessageRequest::new(chat.id.clone(), "Hello"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::InsufficientCredit { required: 1, available: 0 }
    ));
    let stored = fx.store.snapshot_thread(&chat.id).await.unwrap();
    assert!(stored.turns().is_empty());
    assert_eq!(stored.version, 0);
    assert!(fx.client.requests().is_empty());
}

#[tokio::test]
async fn scenario_foreign_chat_is_not_found() {
    let fx = fixture(5, ScriptedClient::replying(&["unused"])).await;
    let foreign = new_chat(&fx.store, "mallory").await;

    let err = fx
        .pipeline
        .send_text("alice", &MessageRequest::new(foreign.id.clone(), "Hello"))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::NotFound));
    assert_eq!(fx.store.snapshot_thread(&foreign.id).await.unwrap(), foreign);
    assert_eq!(credits(&fx.store, "alice").await, 5);
    assert_eq!(credits(&fx.store, "mallory").await, 10);
}

#[tokio::test]
async fn scenario_eleventh_request_is_rate_limited() {
    let fx = fixture(100, ScriptedClient::replying(&["ok"; 10])).await;
    let chat = new_chat(&fx.store, "alice").await;
    let request = MessageRequest::new(chat.id.clone(), "Hello");

    for _ in 0..10 {
        fx.pipeline.send_text("alice", &request).await.unwrap();
    }

    let err = fx.pipeline.send_text("alice", &request).await.unwrap_err();
    let retry_after = err.retry_after_secs().unwrap();
    assert!(matches!(err, PipelineError::RateLimited { .. }));
    assert!((1..=60).contains(&retry_after));
    assert_eq!(credits(&fx.store, "alice").await, 90);
}

#[tokio::test]
async fn test_prompt_is_sent_once_outside_history() {
    let fx = fixture(5, ScriptedClient::replying(&["second answer"])).await;
    let mut chat = new_chat(&fx.store, "alice").await;
    chat.append(Turn::user("Hello"));
    chat.append(Turn::assistant("Hi there"));
    fx.store.save_thread(&chat).await.unwrap();

    fx.pipeline
        .send_text("alice", &MessageRequest::new(chat.id.clone(), "How are you?"))
        .await
        .unwrap();

    let requests = fx.client.requests();
    assert_eq!(requests.len(), 1);
    let sent = &requests[0];
    assert_eq!(sent.prompt, "How are you?");
    assert_eq!(sent.model, "gemini-1.5-flash");
    assert_eq!(sent.history.len(), 2);
    assert_eq!(sent.history[0].role, ModelRole::User);
    assert_eq!(sent.history[1].role, ModelRole::Model);
    assert!(sent.history.iter().all(|h| h.text != "How are you?"));
}

#[tokio::test]
async fn test_validation_runs_before_credit_and_store() {
    let fx = fixture(0, ScriptedClient::replying(&[])).await;
    let body = serde_json::json!({"chatId": "short", "prompt": "  "});
    let request: MessageRequest = serde_json::from_value(body).unwrap();

    let err = fx.pipeline.send_text("alice", &request).await.unwrap_err();
    match err {
        PipelineError::Validation(fields) => {
            let names: Vec<&str> = fields.iter().map(|f| f.field).collect();
            assert_eq!(names, vec!["chatId", "prompt"]);
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_upstream_failures_do_not_touch_state() {
    let cases = vec![
        (CompletionError::RateLimited { retry_after_secs: 17 }, "UpstreamRateLimited"),
        (CompletionError::unavailable("invalid api key"), "UpstreamUnavailable"),
        (CompletionError::EmptyCompletion, "EmptyCompletion"),
    ];

    for (failure, kind) in cases {
        let fx = fixture(3, ScriptedClient::failing(failure)).await;
        let chat = new_chat(&fx.store, "alice").await;

        let err = fx
            .pipeline
            .send_text("alice", &MessageRequest::new(chat.id.clone(), "Hello"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), kind);
        assert!(fx.store.snapshot_thread(&chat.id).await.unwrap().turns().is_empty());
        assert_eq!(credits(&fx.store, "alice").await, 3);
    }
}

#[tokio::test]
async fn test_slow_completion_times_out_cleanly() {
    let config = PipelineConfig {
        completion_timeout: Duration::from_millis(20),
        ..PipelineConfig::default()
    };
    let fx = fixture_with(3, ScriptedClient::slow(Duration::from_secs(5)), config).await;
    let chat = new_chat(&fx.store, "alice").await;

    let err = fx
        .pipeline
        .send_text("alice", &MessageRequest::new(chat.id.clone(), "Hello"))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::UpstreamUnavailable { .. }));
    assert!(fx.store.snapshot_thread(&chat.id).await.unwrap().turns().is_empty());
    assert_eq!(credits(&fx.store, "alice").await, 3);
}

#[tokio::test]
async fn test_chat_deleted_mid_exchange_reports_persistence_failure() {
    let fx = fixture(3, ScriptedClient::slow(Duration::from_millis(50))).await;
    let chat = new_chat(&fx.store, "alice").await;

    let store = fx.store.clone();
    let chat_id = chat.id.clone();
    let deleter = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        store.delete_thread(&chat_id, "alice").await.unwrap()
    });

    let err = fx
        .pipeline
        .send_text("alice", &MessageRequest::new(chat.id.clone(), "Hello"))
        .await
        .unwrap_err();

    assert!(deleter.await.unwrap());
    assert!(matches!(err, PipelineError::Persistence { .. }));
    assert_eq!(credits(&fx.store, "alice").await, 3);
}

/// Principal store whose balance reads work but every debit fails
struct BrokenLedger {
    inner: Arc<InMemoryStore>,
}

#[async_trait]
impl PrincipalStore for BrokenLedger {
    async fn get_principal(&self, principal_id: &str) -> quill_persist::Result<Option<Principal>> {
        self.inner.get_principal(principal_id).await
    }

    async fn try_debit(&self, _principal_id: &str, _amount: u64) -> quill_persist::Result<DebitOutcome> {
        Err(PersistError::Connection("users collection unreachable".into()))
    }
}

#[tokio::test]
async fn test_failed_debit_still_delivers_saved_reply() {
    let store = Arc::new(InMemoryStore::new());
    store.insert_principal(Principal::new("alice", "Alice", 1)).await;
    let chat = new_chat(&store, "alice").await;

    let pipeline = MessagePipeline::builder()
        .thread_store(store.clone())
        .principal_store(Arc::new(BrokenLedger { inner: store.clone() }))
        .completion_client(ScriptedClient::replying(&["Hi there"]))
        .retry_policy(RetryPolicy::new(3, Duration::from_millis(1)))
        .build()
        .unwrap();

    let outcome = pipeline
        .send_text("alice", &MessageRequest::new(chat.id.clone(), "Hello"))
        .await
        .unwrap();

    assert!(!outcome.charged);
    assert_eq!(outcome.credits_remaining, 1);
    assert_eq!(outcome.reply.content, "Hi there");
    assert_eq!(credits(&store, "alice").await, 1);

    let stored = store.snapshot_thread(&chat.id).await.unwrap();
    assert_eq!(stored.turns().len(), 2);
}
