use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use quill_persist::DEFAULT_THREAD_NAME;
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    auth::AuthenticatedPrincipal,
    error::{ApiError, ApiResult},
    response::{ChatCreatedResponse, ChatListResponse, ChatView, MessageResponse, ServiceHealth},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct ListChatsQuery {
    pub limit: Option<i64>,
    pub skip: Option<i64>,
}

/// Create an empty chat owned by the caller
#[utoipa::path(
    post,
    path = "/api/chats/create",
    responses(
        (status = 201, description = "Chat created", body = ChatCreatedResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    tag = "chats"
)]
pub async fn create_chat(
    State(state): State<Arc<AppState>>,
    principal: AuthenticatedPrincipal,
) -> ApiResult<(StatusCode, Json<ChatCreatedResponse>)> {
    let owner_name = match principal.0.name.clone() {
        Some(name) => name,
        None => state
            .principals
            .get_principal(principal.id())
            .await?
            .map(|p| p.name)
            .unwrap_or_default(),
    };

    let thread = state
        .threads
        .create_thread(principal.id(), &owner_name, DEFAULT_THREAD_NAME)
        .await?;

    tracing::info!(principal_id = %principal.id(), chat_id = %thread.id, "Chat created");

    Ok((
        StatusCode::CREATED,
        Json(ChatCreatedResponse {
            success: true,
            message: "Chat created successfully".to_string(),
            chat: ChatView::from(thread),
        }),
    ))
}

/// List the caller's chats, most recently updated first
#[utoipa::path(
    get,
    path = "/api/chats/get",
    params(
        ("limit" = Option<i64>, Query, description = "Maximum number of chats (default: 100)"),
        ("skip" = Option<i64>, Query, description = "Number of chats to skip")
    ),
    responses(
        (status = 200, description = "Chats of the caller", body = ChatListResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    tag = "chats"
)]
pub async fn list_chats(
    State(state): State<Arc<AppState>>,
    principal: AuthenticatedPrincipal,
    Query(query): Query<ListChatsQuery>,
) -> ApiResult<Json<ChatListResponse>> {
    let limit = query.limit.unwrap_or(100).clamp(1, 100);

    let chats = state
        .threads
        .list_threads(principal.id(), Some(limit), query.skip)
        .await?;

    Ok(Json(ChatListResponse {
        success: true,
        chats: chats.into_iter().map(ChatView::from).collect(),
    }))
}

/// Delete one of the caller's chats together with its turns
#[utoipa::path(
    delete,
    path = "/api/chats/delete/{chat_id}",
    params(("chat_id" = String, Path, description = "Chat ID")),
    responses(
        (status = 200, description = "Chat deleted", body = MessageResponse),
        (status = 404, description = "Chat not found or not authorized")
    ),
    tag = "chats"
)]
pub async fn delete_chat(
    State(state): State<Arc<AppState>>,
    principal: AuthenticatedPrincipal,
    Path(chat_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let deleted = state.threads.delete_thread(&chat_id, principal.id()).await?;
    if !deleted {
        return Err(ApiError::NotFound(
            "Chat not found or not authorized".to_string(),
        ));
    }

    tracing::info!(principal_id = %principal.id(), chat_id = %chat_id, "Chat deleted");
    Ok(Json(MessageResponse::ok("Chat deleted successfully")))
}

/// Retired message endpoint
#[utoipa::path(
    post,
    path = "/api/chats/message",
    responses((status = 410, description = "Moved to /api/messages/text")),
    tag = "chats"
)]
pub async fn legacy_message(_principal: AuthenticatedPrincipal) -> ApiError {
    ApiError::Gone {
        message: "This endpoint has moved. Use POST /api/messages/text instead.".to_string(),
        new_endpoint: "/api/messages/text".to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/api/chats/health",
    responses((status = 200, description = "Chats service is healthy", body = ServiceHealth)),
    tag = "chats"
)]
pub async fn health() -> Json<ServiceHealth> {
    Json(ServiceHealth::new(
        "Chats service is healthy",
        &["GET /get", "POST /create", "DELETE /delete/:chatId"],
    ))
}
