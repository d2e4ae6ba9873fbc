use async_trait::async_trait;
use axum::{
    extract::{FromRequest, Request, State},
    Json,
};
use quill_pipeline::{validate, MessageRequest, PipelineError};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    auth::AuthenticatedPrincipal,
    error::{ApiError, ApiResult},
    response::{MessageReplyResponse, ServiceHealth},
    state::AppState,
};

/// Documented shape of a message body
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageBody {
    /// Identifier of a chat owned by the caller
    #[schema(example = "65f1c0a2b3d4e5f6a7b8c9d0")]
    pub chat_id: String,
    #[schema(example = "What is a borrow checker?")]
    pub prompt: String,
}

/// Message payload that never rejects.
///
/// A body that is not readable JSON becomes an empty request, so it is
/// counted by the rate limiter and reported field by field by the validator
/// like any other bad input.
#[derive(Debug)]
pub struct MessageBody(pub MessageRequest);

#[async_trait]
impl<S> FromRequest<S> for MessageBody
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<MessageRequest>::from_request(req, state).await {
            Ok(Json(request)) => Ok(MessageBody(request)),
            Err(rejection) => {
                tracing::debug!(reason = %rejection.body_text(), "Unreadable message body");
                Ok(MessageBody(MessageRequest::default()))
            }
        }
    }
}

/// Send a text message and receive the assistant's reply
///
/// Body: `{"chatId": string, "prompt": string}`. Costs one credit, charged
/// only after the reply is saved.
#[utoipa::path(
    post,
    path = "/api/messages/text",
    request_body = SendMessageBody,
    responses(
        (status = 200, description = "Reply generated and saved", body = MessageReplyResponse),
        (status = 400, description = "Invalid chatId or prompt"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Insufficient credits or expired token"),
        (status = 404, description = "Chat not found"),
        (status = 429, description = "Rate limited (retryAfter in seconds)"),
        (status = 503, description = "AI service unavailable (retryAfter in seconds)"),
        (status = 500, description = "Generation or persistence failure")
    ),
    tag = "messages"
)]
pub async fn send_text(
    State(state): State<Arc<AppState>>,
    principal: AuthenticatedPrincipal,
    MessageBody(request): MessageBody,
) -> ApiResult<Json<MessageReplyResponse>> {
    let outcome = state.pipeline.send_text(principal.id(), &request).await?;
    Ok(Json(MessageReplyResponse::from(outcome)))
}

/// Image generation placeholder
///
/// Authenticates and validates like the text route, then reports that the
/// feature is not available.
#[utoipa::path(
    post,
    path = "/api/messages/image",
    request_body = SendMessageBody,
    responses(
        (status = 400, description = "Invalid chatId or prompt"),
        (status = 401, description = "Missing or invalid token"),
        (status = 501, description = "Image messages not implemented yet")
    ),
    tag = "messages"
)]
pub async fn send_image(
    principal: AuthenticatedPrincipal,
    MessageBody(request): MessageBody,
) -> ApiResult<Json<MessageReplyResponse>> {
    validate(&request).map_err(PipelineError::Validation)?;

    tracing::debug!(principal_id = %principal.id(), "Image message requested");
    Err(ApiError::NotImplemented(
        "Image messages not implemented yet".to_string(),
    ))
}

#[utoipa::path(
    get,
    path = "/api/messages/health",
    responses((status = 200, description = "Messages service is healthy", body = ServiceHealth)),
    tag = "messages"
)]
pub async fn health() -> Json<ServiceHealth> {
    Json(ServiceHealth::new(
        "Messages service is healthy",
        &["POST /text", "POST /image"],
    ))
}
