use quill_persist::{ChatThread, PersistError, ThreadStore, Turn};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::error::{PipelineError, Result};

/// Bounded retry with linear backoff (`attempt * backoff_step`)
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_step: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_step,
        }
    }

    fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(100))
    }
}

/// Durable save of a thread plus the turns produced by one exchange.
///
/// The pending turns are applied to `base` on every attempt. When another
/// writer saved the thread first, the fresh copy is reloaded and the pending
/// turns are re-applied on top of it, so neither exchange loses its turns.
pub struct PersistenceCommitter {
    threads: Arc<dyn ThreadStore>,
    policy: RetryPolicy,
}

impl PersistenceCommitter {
    pub fn new(threads: Arc<dyn ThreadStore>, policy: RetryPolicy) -> Self {
        Self { threads, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn commit(&self, mut base: ChatThread, pending: &[Turn]) -> Result<ChatThread> {
        let mut last_error = String::new();

        for attempt in 1..=self.policy.max_attempts {
            let mut candidate = base.clone();
            for turn in pending {
                candidate.append(turn.clone());
            }

            match self.threads.save_thread(&candidate).await {
                Ok(saved) => {
                    debug!(chat_id = %saved.id, attempt, version = saved.version, "Thread committed");
                    return Ok(saved);
                }
                Err(PersistError::VersionConflict { expected, .. }) => {
                    warn!(chat_id = %base.id, attempt, expected, "Concurrent update, reloading thread");
                    last_error = format!("version conflict at version {}", expected);
                    match self.threads.find_thread(&base.id, &base.owner_id).await {
                        Ok(Some(fresh)) => base = fresh,
                        Ok(None) => return Err(self.vanished(&base.id, attempt)),
                        Err(e) => last_error = e.to_string(),
                    }
                }
                Err(PersistError::ThreadNotFound(_)) => {
                    return Err(self.vanished(&base.id, attempt));
                }
                Err(e) if e.is_transient() => {
                    warn!(chat_id = %base.id, attempt, error = %e, "Transient storage failure");
                    last_error = e.to_string();
                }
                Err(e) => {
                    error!(chat_id = %base.id, attempt, error = %e, "Thread save failed");
                    return Err(PipelineError::Persistence {
                        attempts: attempt,
                        reason: e.to_string(),
                    });
                }
            }

            if attempt < self.policy.max_attempts {
                tokio::time::sleep(self.policy.delay_after(attempt)).await;
            }
        }

        error!(
            chat_id = %base.id,
            attempts = self.policy.max_attempts,
            reason = %last_error,
            "Giving up on thread save"
        );
        Err(PipelineError::Persistence {
            attempts: self.policy.max_attempts,
            reason: last_error,
        })
    }

    fn vanished(&self, chat_id: &str, attempt: u32) -> PipelineError {
        error!(chat_id = %chat_id, attempt, "Thread deleted before the reply was saved");
        PipelineError::Persistence {
            attempts: attempt,
            reason: "chat was deleted while the reply was being generated".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quill_persist::InMemoryStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Delegates to an in-memory store after failing the first N saves
    struct FlakyStore {
        inner: InMemoryStore,
        failures_left: AtomicU32,
        saves: AtomicU32,
    }

    #[async_trait]
    impl ThreadStore for FlakyStore {
        async fn create_thread(&self, o: &str, n: &str, d: &str) -> quill_persist::Result<ChatThread> {
            self.inner.create_thread(o, n, d).await
        }
        async fn find_thread(&self, t: &str, o: &str) -> quill_persist::Result<Option<ChatThread>> {
            self.inner.find_thread(t, o).await
        }
        async fn list_threads(
            &self,
            o: &str,
            l: Option<i64>,
            s: Option<i64>,
        ) -> quill_persist::Result<Vec<ChatThread>> {
            self.inner.list_threads(o, l, s).await
        }
        async fn save_thread(&self, thread: &ChatThread) -> quill_persist::Result<ChatThread> {
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(PersistError::Unavailable("socket closed".into()));
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.inner.save_thread(thread).await
        }
        async fn delete_thread(&self, t: &str, o: &str) -> quill_persist::Result<bool> {
            self.inner.delete_thread(t, o).await
        }
        async fn ping(&self) -> quill_persist::Result<()> {
            Ok(())
        }
    }

    fn flaky(failures: u32) -> Arc<FlakyStore> {
        Arc::new(FlakyStore {
            inner: InMemoryStore::new(),
            failures_left: AtomicU32::new(failures),
            saves: AtomicU32::new(0),
        })
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_two_failures_then_success_saves_once() {
        let store = flaky(2);
        let thread = store.create_thread("owner", "Ada", "New chat").await.unwrap();
        let committer = PersistenceCommitter::new(store.clone(), fast_policy());

        let saved = committer
            .commit(thread.clone(), &[Turn::user("Hello"), Turn::assistant("Hi")])
            .await
            .unwrap();

        assert_eq!(saved.turns().len(), 2);
        assert_eq!(saved.version, thread.version + 1);
        assert_eq!(store.saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_report_attempts() {
        let store = flaky(3);
        let thread = store.create_thread("owner", "Ada", "New chat").await.unwrap();
        let committer = PersistenceCommitter::new(store.clone(), fast_policy());

        let err = committer.commit(thread.clone(), &[Turn::user("Hello")]).await.unwrap_err();
        assert!(matches!(err, PipelineError::Persistence { attempts: 3, .. }));

        let stored = store.inner.snapshot_thread(&thread.id).await.unwrap();
        assert!(stored.turns().is_empty());
    }

    #[tokio::test]
    async fn test_conflict_reloads_and_keeps_both_exchanges() {
        let store = Arc::new(InMemoryStore::new());
        let stale = store.create_thread("owner", "Ada", "New chat").await.unwrap();

        // Another exchange lands first
        let mut other = stale.clone();
        other.append(Turn::user("first"));
        other.append(Turn::assistant("one"));
        store.save_thread(&other).await.unwrap();

        let committer = PersistenceCommitter::new(store.clone(), fast_policy());
        let saved = committer
            .commit(stale, &[Turn::user("second"), Turn::assistant("two")])
            .await
            .unwrap();

        let contents: Vec<&str> = saved.turns().iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "one", "second", "two"]);
        assert_eq!(saved.version, 2);
    }

    #[tokio::test]
    async fn test_deleted_thread_is_not_retried() {
        let store = Arc::new(InMemoryStore::new());
        let thread = store.create_thread("owner", "Ada", "New chat").await.unwrap();
        store.delete_thread(&thread.id, "owner").await.unwrap();

        let committer = PersistenceCommitter::new(store, fast_policy());
        let err = committer.commit(thread, &[Turn::user("Hello")]).await.unwrap_err();
        assert!(matches!(err, PipelineError::Persistence { attempts: 1, .. }));
    }
}
