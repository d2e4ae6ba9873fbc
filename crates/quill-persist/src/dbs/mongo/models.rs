use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::{ChatThread, Principal, Turn};

/// MongoDB-specific thread document (uses ObjectId)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MongoChatThread {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub owner_id: String,
    #[serde(default)]
    pub owner_name: String,
    pub display_name: String,
    #[serde(default)]
    pub turns: Vec<Turn>,
    /// Missing on documents written before versioning existed
    #[serde(default)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// MongoDB-specific principal document, shared with the identity service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPrincipal {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub credits: i64,
}

// Conversions between database-agnostic and MongoDB-specific models

impl From<MongoChatThread> for ChatThread {
    fn from(thread: MongoChatThread) -> Self {
        ChatThread::from_parts(
            thread.id.to_hex(),
            thread.owner_id,
            thread.owner_name,
            thread.display_name,
            thread.turns,
            thread.version.max(0) as u64,
            thread.created_at,
            thread.updated_at,
        )
    }
}

impl MongoChatThread {
    /// Document for `thread` as it should look after a successful save
    pub fn from_thread(thread: &ChatThread, id: ObjectId, version: i64) -> Self {
        Self {
            id,
            owner_id: thread.owner_id.clone(),
            owner_name: thread.owner_name.clone(),
            display_name: thread.display_name.clone(),
            turns: thread.turns().to_vec(),
            version,
            created_at: thread.created_at,
            updated_at: Utc::now().max(thread.updated_at),
        }
    }
}

impl From<MongoPrincipal> for Principal {
    fn from(principal: MongoPrincipal) -> Self {
        Self {
            id: principal.id.to_hex(),
            name: principal.name,
            credits: principal.credits.max(0) as u64,
        }
    }
}
