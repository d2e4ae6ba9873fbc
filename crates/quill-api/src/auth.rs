//! Bearer-token identity verification.
//!
//! Tokens are issued elsewhere; this module only verifies them and turns the
//! claims into an [`Identity`]. Handlers take an [`AuthenticatedPrincipal`]
//! argument to require authentication.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

use crate::error::ApiError;
use crate::state::AppState;

/// Shortest string accepted as a token before attempting verification
const MIN_TOKEN_LEN: usize = 10;

/// Verified caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub principal_id: String,
    pub name: Option<String>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authorization header is required")]
    MissingHeader,

    #[error("Invalid authorization format")]
    InvalidFormat,

    #[error("Invalid token provided")]
    TokenTooShort,

    #[error("Invalid token signature")]
    InvalidSignature(String),

    #[error("Malformed token")]
    Malformed(String),

    #[error("Token has expired")]
    Expired,

    #[error("Token missing user identifier")]
    MissingSubject,
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Expired => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Verifier detail not meant for end users
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            AuthError::InvalidSignature(detail) | AuthError::Malformed(detail) => Some(detail),
            _ => None,
        }
    }
}

/// Identity collaborator: verify a bearer token
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
    #[serde(rename = "_id", default)]
    object_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// HS256 JWT verification with a shared secret.
///
/// The subject is read from the `_id` claim, falling back to `id`. `exp` is
/// checked when present but not required.
pub struct JwtIdentityProvider {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityProvider {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_aud = false;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let data = decode::<TokenClaims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => AuthError::Malformed(e.to_string()),
                _ => AuthError::InvalidSignature(e.to_string()),
            }
        })?;

        let claims = data.claims;
        let principal_id = claims
            .object_id
            .or(claims.id)
            .filter(|id| !id.is_empty())
            .ok_or(AuthError::MissingSubject)?;

        Ok(Identity {
            principal_id,
            name: claims.name,
        })
    }
}

/// Pull the token out of `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidFormat)?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidFormat)?
        .trim();

    if token.len() < MIN_TOKEN_LEN {
        return Err(AuthError::TokenTooShort);
    }
    Ok(token)
}

/// Extractor that verifies the caller. Rejects with the auth error envelope.
#[derive(Debug, Clone)]
pub struct AuthenticatedPrincipal(pub Identity);

impl AuthenticatedPrincipal {
    pub fn id(&self) -> &str {
        &self.0.principal_id
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthenticatedPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let identity = state.identity.verify(token).await.map_err(|e| {
            tracing::info!(
                method = %parts.method,
                uri = %parts.uri,
                reason = %e,
                "Authentication failed"
            );
            e
        })?;
        Ok(AuthenticatedPrincipal(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "unit-test-secret";

    fn mint(claims: serde_json::Value) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn now() -> u64 {
        chrono::Utc::now().timestamp() as u64
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_errors() {
        assert!(matches!(bearer_token(&HeaderMap::new()), Err(AuthError::MissingHeader)));
        assert!(matches!(bearer_token(&headers("Token abcdefghijk")), Err(AuthError::InvalidFormat)));
        assert!(matches!(bearer_token(&headers("Bearer short")), Err(AuthError::TokenTooShort)));
        assert_eq!(bearer_token(&headers("Bearer abcdefghijk")).unwrap(), "abcdefghijk");
    }

    #[tokio::test]
    async fn test_subject_from_either_claim() {
        let provider = JwtIdentityProvider::new(SECRET);

        let token = mint(json!({"_id": "abc123", "name": "Ada", "exp": now() + 600}));
        let identity = provider.verify(&token).await.unwrap();
        assert_eq!(identity.principal_id, "abc123");
        assert_eq!(identity.name.as_deref(), Some("Ada"));

        // Tokens without exp are accepted
        let token = mint(json!({"id": "def456"}));
        assert_eq!(provider.verify(&token).await.unwrap().principal_id, "def456");
    }

    #[tokio::test]
    async fn test_rejections() {
        let provider = JwtIdentityProvider::new(SECRET);

        let expired = mint(json!({"id": "abc", "exp": now() - 3600}));
        let err = provider.verify(&expired).await.unwrap_err();
        assert!(matches!(err, AuthError::Expired));
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        let anonymous = mint(json!({"name": "Nobody", "exp": now() + 600}));
        assert!(matches!(provider.verify(&anonymous).await, Err(AuthError::MissingSubject)));

        let forged = encode(
            &Header::default(),
            &json!({"id": "abc"}),
            &EncodingKey::from_secret(b"another-secret"),
        )
        .unwrap();
        assert!(matches!(provider.verify(&forged).await, Err(AuthError::InvalidSignature(_))));

        assert!(matches!(provider.verify("not.a.jwt").await, Err(AuthError::Malformed(_))));
    }
}
