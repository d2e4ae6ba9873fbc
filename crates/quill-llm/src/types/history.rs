use serde::{Deserialize, Serialize};

/// Role vocabulary of the completion service.
///
/// Stored conversation turns map onto this: user turns become `User`,
/// assistant turns become `Model`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelRole {
    User,
    Model,
}

impl ModelRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// One prior exchange unit sent to the model as context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: ModelRole,
    pub text: String,
}

impl HistoryEntry {
    pub fn new(role: ModelRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(ModelRole::User, text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(ModelRole::Model, text)
    }
}
