use serde::Deserialize;
use serde_json::Value;

use crate::error::FieldError;

/// Minimum length of a chat identifier
pub const MIN_CHAT_ID_LEN: usize = 24;

const CHAT_ID_REQUIRED: &str = "Chat ID is required";
const CHAT_ID_INVALID: &str = "Invalid chat ID format";
const PROMPT_REQUIRED: &str = "Message content is required";
const PROMPT_EMPTY: &str = "Message cannot be empty";

/// Inbound message payload as received.
///
/// Fields stay untyped so that a wrong JSON type is reported as a field
/// error instead of failing deserialization of the whole body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRequest {
    #[serde(default)]
    pub chat_id: Option<Value>,
    #[serde(default)]
    pub prompt: Option<Value>,
}

impl MessageRequest {
    pub fn new(chat_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            chat_id: Some(Value::String(chat_id.into())),
            prompt: Some(Value::String(prompt.into())),
        }
    }
}

/// A payload that passed every structural check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedMessage {
    pub chat_id: String,
    pub prompt: String,
}

/// Check both fields and report every failure at once
pub fn validate(request: &MessageRequest) -> Result<ValidatedMessage, Vec<FieldError>> {
    let mut errors = Vec::new();

    let chat_id = match present(&request.chat_id) {
        None => {
            errors.push(FieldError::new("chatId", CHAT_ID_REQUIRED));
            None
        }
        Some(Value::String(id)) if id.len() >= MIN_CHAT_ID_LEN => Some(id.clone()),
        Some(_) => {
            errors.push(FieldError::new("chatId", CHAT_ID_INVALID));
            None
        }
    };

    let prompt = match present(&request.prompt) {
        None => {
            errors.push(FieldError::new("prompt", PROMPT_REQUIRED));
            None
        }
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text.clone()),
        Some(_) => {
            errors.push(FieldError::new("prompt", PROMPT_EMPTY));
            None
        }
    };

    match (chat_id, prompt) {
        (Some(chat_id), Some(prompt)) => Ok(ValidatedMessage { chat_id, prompt }),
        _ => Err(errors),
    }
}

/// Headline message for a set of field errors
pub fn summary(errors: &[FieldError]) -> &'static str {
    let missing = errors
        .iter()
        .any(|e| e.message == CHAT_ID_REQUIRED || e.message == PROMPT_REQUIRED);
    if missing {
        return "chatId and prompt are required fields";
    }
    match errors {
        [only] if only.field == "prompt" => "Prompt must be a non-empty string",
        [only] if only.field == "chatId" => "Invalid chatId format",
        _ => "Invalid message input",
    }
}

// Null and "" count as absent.
fn present(value: &Option<Value>) -> Option<&Value> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(v) => Some(v),
    }
}
