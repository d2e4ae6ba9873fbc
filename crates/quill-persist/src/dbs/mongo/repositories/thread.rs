use mongodb::{Client, Collection, bson::doc, bson::oid::ObjectId};
use futures::TryStreamExt;
use chrono::Utc;

use crate::dbs::mongo::models::MongoChatThread;
use crate::error::Result;
use crate::models::ChatThread;

#[derive(Clone)]
pub struct MongoThreadRepository {
    collection: Collection<MongoChatThread>,
}

/// Outcome of a version-guarded replace
pub enum ReplaceOutcome {
    Replaced(MongoChatThread),
    VersionMismatch,
    Missing,
}

impl MongoThreadRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("chats");
        Self { collection }
    }

    /// Create a new empty thread
    pub async fn create_thread(
        &self,
        owner_id: &str,
        owner_name: &str,
        display_name: &str,
    ) -> Result<MongoChatThread> {
        let now = Utc::now();
        let thread = MongoChatThread {
            id: ObjectId::new(),
            owner_id: owner_id.to_string(),
            owner_name: owner_name.to_string(),
            display_name: display_name.to_string(),
            turns: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        };

        self.collection.insert_one(&thread).await?;
        Ok(thread)
    }

    /// Get thread by id, scoped to its owner
    pub async fn find_thread(
        &self,
        thread_id: ObjectId,
        owner_id: &str,
    ) -> Result<Option<MongoChatThread>> {
        let filter = doc! { "_id": thread_id, "ownerId": owner_id };
        Ok(self.collection.find_one(filter).await?)
    }

    /// List threads for an owner
    pub async fn list_threads(
        &self,
        owner_id: &str,
        limit: Option<i64>,
        skip: Option<i64>,
    ) -> Result<Vec<MongoChatThread>> {
        let filter = doc! { "ownerId": owner_id };
        let mut find_opts = self.collection
            .find(filter)
            .sort(doc! { "updatedAt": -1 });

        if let Some(limit) = limit {
            find_opts = find_opts.limit(limit);
        }
        if let Some(skip) = skip {
            find_opts = find_opts.skip(skip.try_into().unwrap_or(0));
        }

        let threads = find_opts
            .await?
            .try_collect()
            .await?;
        Ok(threads)
    }

    /// Replace the document only if it still carries `thread.version`
    pub async fn replace_if_version(
        &self,
        thread_id: ObjectId,
        thread: &ChatThread,
    ) -> Result<ReplaceOutcome> {
        let expected = thread.version as i64;
        let replacement = MongoChatThread::from_thread(thread, thread_id, expected + 1);

        // Legacy documents have no version field at all; treat them as version 0
        let version_filter = if expected == 0 {
            doc! { "$in": [0_i64, mongodb::bson::Bson::Null] }
        } else {
            doc! { "$eq": expected }
        };
        let filter = doc! {
            "_id": thread_id,
            "ownerId": thread.owner_id.as_str(),
            "version": version_filter,
        };

        let result = self.collection.replace_one(filter, &replacement).await?;
        if result.matched_count == 1 {
            return Ok(ReplaceOutcome::Replaced(replacement));
        }

        let still_there = self
            .collection
            .count_documents(doc! { "_id": thread_id, "ownerId": thread.owner_id.as_str() })
            .await?;
        if still_there == 0 {
            Ok(ReplaceOutcome::Missing)
        } else {
            Ok(ReplaceOutcome::VersionMismatch)
        }
    }

    /// Delete thread (turns are embedded and go with it)
    pub async fn delete_thread(&self, thread_id: ObjectId, owner_id: &str) -> Result<bool> {
        let filter = doc! { "_id": thread_id, "ownerId": owner_id };
        let result = self.collection.delete_one(filter).await?;
        Ok(result.deleted_count > 0)
    }
}
