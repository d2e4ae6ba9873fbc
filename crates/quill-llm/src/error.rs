use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use thiserror::Error;

/// Retry hint used when the provider signals trouble without saying how long to wait
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum CompletionError {
    /// Service down, unreachable, timed out or misconfigured (bad key, unknown model)
    #[error("Completion service unavailable: {reason}")]
    Unavailable {
        reason: String,
        retry_after_secs: u64,
    },

    #[error("Completion service rate limited (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("Completion service returned an empty completion")]
    EmptyCompletion,

    #[error("Completion service error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode completion response: {0}")]
    Decode(String),
}

impl CompletionError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
            retry_after_secs: DEFAULT_RETRY_AFTER_SECS,
        }
    }

    /// Classify a non-success HTTP answer from a provider
    pub fn from_status(status: StatusCode, headers: &HeaderMap, body: String) -> Self {
        let retry_after_secs = retry_after_secs(headers).unwrap_or(DEFAULT_RETRY_AFTER_SECS);

        match status {
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited { retry_after_secs },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                Self::Unavailable {
                    reason: format!("provider rejected credentials or model ({}): {}", status, body),
                    retry_after_secs,
                }
            }
            s if s.is_server_error() => Self::Unavailable {
                reason: format!("provider error ({}): {}", status, body),
                retry_after_secs,
            },
            _ => Self::Api {
                status: status.as_u16(),
                message: body,
            },
        }
    }

    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::unavailable(format!("request timed out: {}", err))
        } else {
            Self::unavailable(format!("request failed: {}", err))
        }
    }
}

/// Seconds from a `Retry-After` header given in delta-seconds form
pub fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
}

/// Reject completions that are blank once whitespace is stripped
pub(crate) fn non_blank(text: Option<String>) -> Result<String, CompletionError> {
    match text {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(CompletionError::EmptyCompletion),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_rate_limit_uses_header_hint() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));

        let err = CompletionError::from_status(StatusCode::TOO_MANY_REQUESTS, &headers, String::new());
        assert!(matches!(err, CompletionError::RateLimited { retry_after_secs: 12 }));
    }

    #[test]
    fn test_rate_limit_without_header_uses_default() {
        let err = CompletionError::from_status(
            StatusCode::TOO_MANY_REQUESTS,
            &HeaderMap::new(),
            "quota".to_string(),
        );
        assert!(matches!(
            err,
            CompletionError::RateLimited { retry_after_secs } if retry_after_secs == DEFAULT_RETRY_AFTER_SECS
        ));
    }

    #[test]
    fn test_credential_failure_is_unavailable() {
        let err = CompletionError::from_status(StatusCode::FORBIDDEN, &HeaderMap::new(), "bad key".into());
        assert!(matches!(err, CompletionError::Unavailable { .. }));
    }

    #[test]
    fn test_server_error_is_unavailable() {
        let err = CompletionError::from_status(
            StatusCode::SERVICE_UNAVAILABLE,
            &HeaderMap::new(),
            "overloaded".into(),
        );
        assert!(matches!(err, CompletionError::Unavailable { .. }));
    }

    #[test]
    fn test_bad_request_is_api_error() {
        let err = CompletionError::from_status(StatusCode::BAD_REQUEST, &HeaderMap::new(), "nope".into());
        assert!(matches!(err, CompletionError::Api { status: 400, .. }));
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("Hi".into())).unwrap(), "Hi");
        assert!(matches!(non_blank(Some("  \n".into())), Err(CompletionError::EmptyCompletion)));
        assert!(matches!(non_blank(None), Err(CompletionError::EmptyCompletion)));
    }
}
