use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::{PersistError, Result};
use crate::models::{ChatThread, Principal};
use crate::store::{DebitOutcome, PrincipalStore, ThreadStore};

/// Process-local store for tests and single-instance development.
///
/// Each operation holds the relevant lock for its whole duration, so the
/// version check in `save_thread` and the conditional debit are atomic.
#[derive(Default)]
pub struct InMemoryStore {
    threads: RwLock<HashMap<String, ChatThread>>,
    principals: RwLock<HashMap<String, Principal>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_principal(&self, principal: Principal) {
        self.principals
            .write()
            .await
            .insert(principal.id.clone(), principal);
    }

    /// Store a thread as-is (seeding fixtures); overwrites any existing copy
    pub async fn insert_thread(&self, thread: ChatThread) {
        self.threads.write().await.insert(thread.id.clone(), thread);
    }

    /// Unscoped read, for assertions in tests
    pub async fn snapshot_thread(&self, thread_id: &str) -> Option<ChatThread> {
        self.threads.read().await.get(thread_id).cloned()
    }
}

#[async_trait]
impl ThreadStore for InMemoryStore {
    async fn create_thread(
        &self,
        owner_id: &str,
        owner_name: &str,
        display_name: &str,
    ) -> Result<ChatThread> {
        let thread = ChatThread::new(owner_id, owner_name, display_name);
        self.threads
            .write()
            .await
            .insert(thread.id.clone(), thread.clone());
        Ok(thread)
    }

    async fn find_thread(&self, thread_id: &str, owner_id: &str) -> Result<Option<ChatThread>> {
        let threads = self.threads.read().await;
        Ok(threads
            .get(thread_id)
            .filter(|t| t.is_owned_by(owner_id))
            .cloned())
    }

    async fn list_threads(
        &self,
        owner_id: &str,
        limit: Option<i64>,
        skip: Option<i64>,
    ) -> Result<Vec<ChatThread>> {
        let threads = self.threads.read().await;
        let mut owned: Vec<ChatThread> = threads
            .values()
            .filter(|t| t.is_owned_by(owner_id))
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let skip = skip.unwrap_or(0).max(0) as usize;
        let limit = limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);
        Ok(owned.into_iter().skip(skip).take(limit).collect())
    }

    async fn save_thread(&self, thread: &ChatThread) -> Result<ChatThread> {
        let mut threads = self.threads.write().await;
        let stored = threads
            .get(&thread.id)
            .filter(|t| t.is_owned_by(&thread.owner_id))
            .ok_or_else(|| PersistError::ThreadNotFound(thread.id.clone()))?;

        if stored.version != thread.version {
            return Err(PersistError::VersionConflict {
                thread_id: thread.id.clone(),
                expected: thread.version,
            });
        }

        let mut saved = thread.clone();
        saved.version += 1;
        saved.updated_at = Utc::now().max(saved.updated_at);
        threads.insert(saved.id.clone(), saved.clone());
        Ok(saved)
    }

    async fn delete_thread(&self, thread_id: &str, owner_id: &str) -> Result<bool> {
        let mut threads = self.threads.write().await;
        let owned = threads
            .get(thread_id)
            .map(|t| t.is_owned_by(owner_id))
            .unwrap_or(false);
        if owned {
            threads.remove(thread_id);
        }
        Ok(owned)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl PrincipalStore for InMemoryStore {
    async fn get_principal(&self, principal_id: &str) -> Result<Option<Principal>> {
        Ok(self.principals.read().await.get(principal_id).cloned())
    }

    async fn try_debit(&self, principal_id: &str, amount: u64) -> Result<DebitOutcome> {
        let mut principals = self.principals.write().await;
        let Some(principal) = principals.get_mut(principal_id) else {
            return Ok(DebitOutcome::Missing);
        };

        if principal.credits < amount {
            return Ok(DebitOutcome::Insufficient {
                balance: principal.credits,
            });
        }

        principal.credits -= amount;
        Ok(DebitOutcome::Debited {
            remaining: principal.credits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Turn;

    #[tokio::test]
    async fn test_find_is_owner_scoped() {
        let store = InMemoryStore::new();
        let thread = store.create_thread("alice", "Alice", "New chat").await.unwrap();

        assert!(store.find_thread(&thread.id, "alice").await.unwrap().is_some());
        assert!(store.find_thread(&thread.id, "mallory").await.unwrap().is_none());
        assert!(store.find_thread("no-such-thread", "alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_bumps_version() {
        let store = InMemoryStore::new();
        let mut thread = store.create_thread("alice", "Alice", "New chat").await.unwrap();
        thread.append(Turn::user("hello"));

        let saved = store.save_thread(&thread).await.unwrap();
        assert_eq!(saved.version, 1);

        let loaded = store.find_thread(&thread.id, "alice").await.unwrap().unwrap();
        assert_eq!(loaded.turns().len(), 1);
        assert_eq!(loaded.version, 1);
    }

    #[tokio::test]
    async fn test_stale_save_conflicts() {
        let store = InMemoryStore::new();
        let thread = store.create_thread("alice", "Alice", "New chat").await.unwrap();

        let mut first = thread.clone();
        first.append(Turn::user("first"));
        let mut second = thread.clone();
        second.append(Turn::user("second"));

        store.save_thread(&first).await.unwrap();
        let err = store.save_thread(&second).await.unwrap_err();
        assert!(matches!(err, PersistError::VersionConflict { expected: 0, .. }));

        let stored = store.snapshot_thread(&thread.id).await.unwrap();
        assert_eq!(stored.turns()[0].content, "first");
    }

    #[tokio::test]
    async fn test_save_of_deleted_thread_is_not_found() {
        let store = InMemoryStore::new();
        let thread = store.create_thread("alice", "Alice", "New chat").await.unwrap();
        assert!(store.delete_thread(&thread.id, "alice").await.unwrap());

        let err = store.save_thread(&thread).await.unwrap_err();
        assert!(matches!(err, PersistError::ThreadNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_requires_owner() {
        let store = InMemoryStore::new();
        let thread = store.create_thread("alice", "Alice", "New chat").await.unwrap();

        assert!(!store.delete_thread(&thread.id, "mallory").await.unwrap());
        assert!(store.snapshot_thread(&thread.id).await.is_some());
    }

    #[tokio::test]
    async fn test_list_sorted_by_updated_desc() {
        let store = InMemoryStore::new();
        let older = store.create_thread("alice", "Alice", "older").await.unwrap();
        let _newer = store.create_thread("alice", "Alice", "newer").await.unwrap();
        store.create_thread("bob", "Bob", "other").await.unwrap();

        let mut touched = older.clone();
        touched.append(Turn::user("bump"));
        store.save_thread(&touched).await.unwrap();

        let listed = store.list_threads("alice", None, None).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].display_name, "older");

        let limited = store.list_threads("alice", Some(1), Some(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].display_name, "newer");
    }

    #[tokio::test]
    async fn test_conditional_debit() {
        let store = InMemoryStore::new();
        store.insert_principal(Principal::new("alice", "Alice", 3)).await;

        assert_eq!(
            store.try_debit("alice", 2).await.unwrap(),
            DebitOutcome::Debited { remaining: 1 }
        );
        assert_eq!(
            store.try_debit("alice", 2).await.unwrap(),
            DebitOutcome::Insufficient { balance: 1 }
        );
        assert_eq!(store.try_debit("ghost", 1).await.unwrap(), DebitOutcome::Missing);
        assert_eq!(store.get_principal("alice").await.unwrap().unwrap().credits, 1);
    }
}
