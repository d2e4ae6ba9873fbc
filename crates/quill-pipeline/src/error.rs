use quill_llm::CompletionError;
use quill_persist::PersistError;
use serde::Serialize;
use thiserror::Error;

/// One rejected input field, keyed by its wire name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Every way a message exchange can end without a reply.
///
/// Variants before `UpstreamUnavailable` are gate failures and leave no side
/// effects behind. `Persistence` is the only failure raised after the
/// provider has already produced (and billed) a completion.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Validation failed for {}", field_names(.0))]
    Validation(Vec<FieldError>),

    #[error("Chat not found")]
    NotFound,

    #[error("Principal not found")]
    PrincipalNotFound,

    #[error("Too many requests. Please wait a moment.")]
    RateLimited { retry_after_secs: u64 },

    #[error("Insufficient credits: {required} required, {available} available")]
    InsufficientCredit { required: u64, available: u64 },

    #[error("AI service is temporarily unavailable: {reason}")]
    UpstreamUnavailable { reason: String, retry_after_secs: u64 },

    #[error("AI service is busy. Please try again shortly.")]
    UpstreamRateLimited { retry_after_secs: u64 },

    #[error("AI service returned an empty response")]
    EmptyCompletion,

    #[error("Reply was generated but could not be saved after {attempts} attempt(s): {reason}")]
    Persistence { attempts: u32, reason: String },

    #[error("Storage error: {0}")]
    Storage(#[from] PersistError),

    #[error("{0}")]
    Unknown(String),
}

impl PipelineError {
    /// Stable name of the error class, used in logs and envelopes
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "ValidationError",
            PipelineError::NotFound | PipelineError::PrincipalNotFound => "NotFound",
            PipelineError::RateLimited { .. } => "RateLimited",
            PipelineError::InsufficientCredit { .. } => "InsufficientCredit",
            PipelineError::UpstreamUnavailable { .. } => "UpstreamUnavailable",
            PipelineError::UpstreamRateLimited { .. } => "UpstreamRateLimited",
            PipelineError::EmptyCompletion => "EmptyCompletion",
            PipelineError::Persistence { .. } => "PersistenceError",
            PipelineError::Storage(_) | PipelineError::Unknown(_) => "Unknown",
        }
    }

    /// Seconds the caller should wait before retrying, when that is meaningful
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            PipelineError::RateLimited { retry_after_secs }
            | PipelineError::UpstreamUnavailable { retry_after_secs, .. }
            | PipelineError::UpstreamRateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

impl From<CompletionError> for PipelineError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::Unavailable {
                reason,
                retry_after_secs,
            } => PipelineError::UpstreamUnavailable {
                reason,
                retry_after_secs,
            },
            CompletionError::RateLimited { retry_after_secs } => {
                PipelineError::UpstreamRateLimited { retry_after_secs }
            }
            CompletionError::EmptyCompletion => PipelineError::EmptyCompletion,
            other => PipelineError::Unknown(other.to_string()),
        }
    }
}

fn field_names(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.field)
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_errors_keep_their_class() {
        let err: PipelineError = CompletionError::RateLimited { retry_after_secs: 12 }.into();
        assert_eq!(err.kind(), "UpstreamRateLimited");
        assert_eq!(err.retry_after_secs(), Some(12));

        let err: PipelineError = CompletionError::unavailable("bad key").into();
        assert_eq!(err.kind(), "UpstreamUnavailable");

        let err: PipelineError = CompletionError::EmptyCompletion.into();
        assert_eq!(err.kind(), "EmptyCompletion");

        let err: PipelineError = CompletionError::Decode("eof".into()).into();
        assert_eq!(err.kind(), "Unknown");
    }

    #[test]
    fn test_validation_message_lists_fields() {
        let err = PipelineError::Validation(vec![
            FieldError::new("chatId", "Chat ID is required"),
            FieldError::new("prompt", "Message content is required"),
        ]);
        assert_eq!(err.to_string(), "Validation failed for chatId, prompt");
        assert_eq!(err.retry_after_secs(), None);
    }
}
