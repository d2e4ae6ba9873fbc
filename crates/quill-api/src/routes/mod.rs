pub mod chats;
pub mod health;
pub mod messages;
pub mod user;

use axum::{extract::OriginalUri, http::Method};

use crate::error::ApiError;

/// Fallback for unmatched routes
pub async fn not_found(method: Method, OriginalUri(uri): OriginalUri) -> ApiError {
    ApiError::NotFound(format!("Cannot {} {}", method, uri.path()))
}
