use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use quill_persist::PersistError;
use quill_pipeline::{validate::summary, PipelineError};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::auth::AuthError;
use crate::response::{error_envelope, ErrorDiagnostic};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    NotImplemented(String),

    #[error("{message}")]
    Gone { message: String, new_endpoint: String },
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Pipeline(e) => match e {
                PipelineError::Validation(_) => StatusCode::BAD_REQUEST,
                PipelineError::NotFound | PipelineError::PrincipalNotFound => StatusCode::NOT_FOUND,
                PipelineError::RateLimited { .. } | PipelineError::UpstreamRateLimited { .. } => {
                    StatusCode::TOO_MANY_REQUESTS
                }
                PipelineError::InsufficientCredit { .. } => StatusCode::FORBIDDEN,
                PipelineError::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                PipelineError::EmptyCompletion
                | PipelineError::Persistence { .. }
                | PipelineError::Storage(_)
                | PipelineError::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Auth(e) => e.status_code(),
            ApiError::Persist(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::Gone { .. } => StatusCode::GONE,
        }
    }

    /// User-facing message plus envelope context fields
    fn envelope_parts(&self) -> (String, Map<String, Value>) {
        let mut extra = Map::new();
        let message = match self {
            ApiError::Pipeline(e) => {
                extra.insert("code".into(), json!(e.kind()));
                if let Some(secs) = e.retry_after_secs() {
                    extra.insert("retryAfter".into(), json!(secs));
                }
                match e {
                    PipelineError::Validation(fields) => {
                        let errors: Map<String, Value> = fields
                            .iter()
                            .map(|f| (f.field.to_string(), json!(f.message)))
                            .collect();
                        extra.insert("validationErrors".into(), Value::Object(errors));
                        summary(fields).to_string()
                    }
                    PipelineError::NotFound => "Chat not found".to_string(),
                    PipelineError::PrincipalNotFound => "User not found".to_string(),
                    PipelineError::InsufficientCredit { required, available } => {
                        extra.insert("required".into(), json!(required));
                        extra.insert("available".into(), json!(available));
                        "Insufficient credits".to_string()
                    }
                    PipelineError::UpstreamUnavailable { .. } => {
                        "AI service is temporarily unavailable".to_string()
                    }
                    PipelineError::Persistence { .. } => {
                        extra.insert("persisted".into(), json!(false));
                        "Your reply was generated but could not be saved. Please try again."
                            .to_string()
                    }
                    PipelineError::Storage(_) | PipelineError::Unknown(_) => {
                        "Failed to process message".to_string()
                    }
                    other => other.to_string(),
                }
            }
            ApiError::Auth(e) => {
                if matches!(e, AuthError::Expired) {
                    extra.insert("expired".into(), json!(true));
                }
                e.to_string()
            }
            ApiError::Persist(_) => "Storage error".to_string(),
            ApiError::Gone {
                message,
                new_endpoint,
            } => {
                extra.insert("newEndpoint".into(), json!(new_endpoint));
                message.clone()
            }
            ApiError::NotFound(msg) | ApiError::NotImplemented(msg) => msg.clone(),
        };
        (message, extra)
    }

    /// Internal detail shown only in development mode
    fn diagnostic(&self) -> Option<String> {
        match self {
            ApiError::Pipeline(PipelineError::UpstreamUnavailable { reason, .. }) => {
                Some(reason.clone())
            }
            ApiError::Pipeline(
                e @ (PipelineError::Persistence { .. }
                | PipelineError::Storage(_)
                | PipelineError::Unknown(_)),
            ) => Some(e.to_string()),
            ApiError::Auth(e) => e.diagnostic().map(str::to_string),
            ApiError::Persist(e) => Some(e.to_string()),
            _ => None,
        }
    }

    fn retry_after(&self) -> Option<u64> {
        match self {
            ApiError::Pipeline(e) => e.retry_after_secs(),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Request failed");
        }

        let (message, extra) = self.envelope_parts();
        let mut response = (status, Json(error_envelope(&message, extra))).into_response();

        if let Some(secs) = self.retry_after() {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        if let Some(detail) = self.diagnostic() {
            response.extensions_mut().insert(ErrorDiagnostic(detail));
        }
        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
