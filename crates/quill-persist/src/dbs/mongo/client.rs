use mongodb::{Client, Database, bson::doc, bson::oid::ObjectId};
use async_trait::async_trait;

use crate::store::{DebitOutcome, PrincipalStore, ThreadStore};
use crate::models::{ChatThread, Principal};
use crate::dbs::mongo::repositories::{MongoPrincipalRepository, MongoThreadRepository};
use crate::dbs::mongo::repositories::thread::ReplaceOutcome;
use crate::error::{Result, PersistError};

pub struct MongoPersistenceClient {
    database: Database,
    thread_repo: MongoThreadRepository,
    principal_repo: MongoPrincipalRepository,
}

impl MongoPersistenceClient {
    /// Connect to MongoDB and create client
    pub async fn connect(mongodb_uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(mongodb_uri)
            .await
            .map_err(|e| PersistError::Connection(e.to_string()))?;

        let thread_repo = MongoThreadRepository::new(&client, database);
        let principal_repo = MongoPrincipalRepository::new(&client, database);

        Ok(Self {
            database: client.database(database),
            thread_repo,
            principal_repo,
        })
    }
}

/// Ids that are not ObjectIds cannot name any stored document
fn parse_id(id: &str) -> Option<ObjectId> {
    ObjectId::parse_str(id).ok()
}

#[async_trait]
impl ThreadStore for MongoPersistenceClient {
    async fn create_thread(
        &self,
        owner_id: &str,
        owner_name: &str,
        display_name: &str,
    ) -> Result<ChatThread> {
        let thread = self
            .thread_repo
            .create_thread(owner_id, owner_name, display_name)
            .await?;
        Ok(thread.into())
    }

    async fn find_thread(&self, thread_id: &str, owner_id: &str) -> Result<Option<ChatThread>> {
        let Some(object_id) = parse_id(thread_id) else {
            return Ok(None);
        };

        let thread = self.thread_repo.find_thread(object_id, owner_id).await?;
        Ok(thread.map(|t| t.into()))
    }

    async fn list_threads(
        &self,
        owner_id: &str,
        limit: Option<i64>,
        skip: Option<i64>,
    ) -> Result<Vec<ChatThread>> {
        let threads = self.thread_repo.list_threads(owner_id, limit, skip).await?;
        Ok(threads.into_iter().map(|t| t.into()).collect())
    }

    async fn save_thread(&self, thread: &ChatThread) -> Result<ChatThread> {
        let object_id = parse_id(&thread.id)
            .ok_or_else(|| PersistError::ThreadNotFound(thread.id.clone()))?;

        match self.thread_repo.replace_if_version(object_id, thread).await? {
            ReplaceOutcome::Replaced(saved) => Ok(saved.into()),
            ReplaceOutcome::VersionMismatch => Err(PersistError::VersionConflict {
                thread_id: thread.id.clone(),
                expected: thread.version,
            }),
            ReplaceOutcome::Missing => Err(PersistError::ThreadNotFound(thread.id.clone())),
        }
    }

    async fn delete_thread(&self, thread_id: &str, owner_id: &str) -> Result<bool> {
        let Some(object_id) = parse_id(thread_id) else {
            return Ok(false);
        };

        self.thread_repo.delete_thread(object_id, owner_id).await
    }

    async fn ping(&self) -> Result<()> {
        self.database.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}

#[async_trait]
impl PrincipalStore for MongoPersistenceClient {
    async fn get_principal(&self, principal_id: &str) -> Result<Option<Principal>> {
        let Some(object_id) = parse_id(principal_id) else {
            return Ok(None);
        };

        let principal = self.principal_repo.find_principal(object_id).await?;
        Ok(principal.map(|p| p.into()))
    }

    async fn try_debit(&self, principal_id: &str, amount: u64) -> Result<DebitOutcome> {
        let Some(object_id) = parse_id(principal_id) else {
            return Ok(DebitOutcome::Missing);
        };
        let amount = i64::try_from(amount)
            .map_err(|_| PersistError::Internal(format!("debit amount {} out of range", amount)))?;

        if let Some(updated) = self.principal_repo.debit_if_sufficient(object_id, amount).await? {
            return Ok(DebitOutcome::Debited {
                remaining: updated.credits.max(0) as u64,
            });
        }

        // The filter missed: tell a short balance apart from a missing principal
        match self.principal_repo.find_principal(object_id).await? {
            Some(principal) => Ok(DebitOutcome::Insufficient {
                balance: principal.credits.max(0) as u64,
            }),
            None => Ok(DebitOutcome::Missing),
        }
    }
}
