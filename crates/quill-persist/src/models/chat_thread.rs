use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// Name given to threads created without one
pub const DEFAULT_THREAD_NAME: &str = "New chat";

/// Database-agnostic conversation thread.
///
/// Turns are append-only and kept in append order. `version` counts durable
/// saves and backs the optimistic check in [`crate::ThreadStore::save_thread`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatThread {
    pub id: String,
    pub owner_id: String,
    pub owner_name: String,
    pub display_name: String,
    turns: Vec<Turn>,
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatThread {
    pub fn new(
        owner_id: impl Into<String>,
        owner_name: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self::with_id(uuid::Uuid::new_v4().simple().to_string(), owner_id, owner_name, display_name)
    }

    pub fn with_id(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        owner_name: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            owner_name: owner_name.into(),
            display_name: display_name.into(),
            turns: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild from stored parts (backend conversions)
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: String,
        owner_id: String,
        owner_name: String,
        display_name: String,
        turns: Vec<Turn>,
        version: u64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner_id,
            owner_name,
            display_name,
            turns,
            version,
            created_at,
            updated_at,
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn is_owned_by(&self, principal_id: &str) -> bool {
        self.owner_id == principal_id
    }

    /// Append a turn in memory. Nothing is durable until the thread is saved.
    ///
    /// A timestamp earlier than the current last turn is raised to it so that
    /// timestamps never run backwards along the sequence.
    pub fn append(&mut self, mut turn: Turn) {
        if let Some(last) = self.turns.last() {
            if turn.timestamp < last.timestamp {
                turn.timestamp = last.timestamp;
            }
        }
        if turn.timestamp > self.updated_at {
            self.updated_at = turn.timestamp;
        }
        self.turns.push(turn);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One authored message unit. `content` is text, or a URL for image turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
    #[serde(default)]
    pub is_image: bool,
    #[serde(default)]
    pub is_published: bool,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            is_image: false,
            is_published: false,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, content)
    }

    pub fn is_user(&self) -> bool {
        self.role == TurnRole::User
    }
}
