use axum::Json;
use utoipa::OpenApi;

use crate::response::{
    ChatCreatedResponse, ChatListResponse, ChatView, MessageReplyResponse, MessageResponse,
    ReplyView, ServiceHealth, TurnView, UserDataResponse, UserView,
};
use crate::routes::{chats, health, messages, user};
use messages::SendMessageBody;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        messages::send_text,
        messages::send_image,
        messages::health,
        chats::create_chat,
        chats::list_chats,
        chats::delete_chat,
        chats::legacy_message,
        chats::health,
        user::user_data,
    ),
    components(schemas(
        health::HealthResponse,
        SendMessageBody,
        MessageReplyResponse,
        ReplyView,
        ChatCreatedResponse,
        ChatListResponse,
        ChatView,
        TurnView,
        UserDataResponse,
        UserView,
        MessageResponse,
        ServiceHealth,
    )),
    tags(
        (name = "messages", description = "Credit-gated AI message exchange"),
        (name = "chats", description = "Chat management"),
        (name = "user", description = "Current user"),
        (name = "health", description = "Liveness")
    )
)]
pub struct ApiDoc;

/// OpenAPI document for the HTTP surface
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
