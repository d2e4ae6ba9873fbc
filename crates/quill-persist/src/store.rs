use async_trait::async_trait;
use crate::models::{ChatThread, Principal};
use crate::error::Result;

/// Document store for chat threads.
///
/// Every lookup is scoped by owner: a thread owned by someone else is
/// reported exactly like a thread that does not exist.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Create an empty thread owned by `owner_id`
    async fn create_thread(
        &self,
        owner_id: &str,
        owner_name: &str,
        display_name: &str,
    ) -> Result<ChatThread>;

    /// Find a thread by id within the owner's scope
    async fn find_thread(&self, thread_id: &str, owner_id: &str) -> Result<Option<ChatThread>>;

    /// List an owner's threads, most recently updated first
    async fn list_threads(
        &self,
        owner_id: &str,
        limit: Option<i64>,
        skip: Option<i64>,
    ) -> Result<Vec<ChatThread>>;

    /// Durably replace the whole thread.
    ///
    /// Succeeds only when the stored version equals `thread.version`; returns
    /// the saved thread with its version bumped by one. A mismatch fails with
    /// [`crate::PersistError::VersionConflict`], a vanished thread with
    /// [`crate::PersistError::ThreadNotFound`].
    async fn save_thread(&self, thread: &ChatThread) -> Result<ChatThread>;

    /// Delete a thread and its turns. Returns false when nothing matched.
    async fn delete_thread(&self, thread_id: &str, owner_id: &str) -> Result<bool>;

    /// Cheap reachability check for health endpoints
    async fn ping(&self) -> Result<()>;
}

/// Result of a conditional balance decrement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitOutcome {
    Debited { remaining: u64 },
    Insufficient { balance: u64 },
    Missing,
}

/// Credit balance storage
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    async fn get_principal(&self, principal_id: &str) -> Result<Option<Principal>>;

    /// Atomically subtract `amount` if and only if the balance covers it.
    /// The balance can never go negative through this call.
    async fn try_debit(&self, principal_id: &str, amount: u64) -> Result<DebitOutcome>;
}
