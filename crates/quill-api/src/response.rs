//! Response envelopes.
//!
//! Every body carries `success`. Errors add `message` and context fields;
//! internal detail travels as an [`ErrorDiagnostic`] response extension and
//! is only written into the body (as `error`) when `server.dev_mode` is on.

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::header::CONTENT_LENGTH,
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use quill_persist::{ChatThread, Principal, Turn};
use quill_pipeline::MessageOutcome;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::state::AppState;

/// Largest error body the diagnostics layer will rewrite
const MAX_ENVELOPE_BYTES: usize = 64 * 1024;

/// Internal error detail attached to a response by [`crate::error::ApiError`]
#[derive(Debug, Clone)]
pub struct ErrorDiagnostic(pub String);

pub fn error_envelope(message: &str, extra: Map<String, Value>) -> Value {
    let mut body = Map::new();
    body.insert("success".into(), Value::Bool(false));
    body.insert("message".into(), Value::String(message.to_string()));
    body.extend(extra);
    Value::Object(body)
}

/// Copy the diagnostic extension into the body when development mode is on
pub async fn attach_diagnostics(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let response = next.run(req).await;
    if !state.config.server.dev_mode {
        return response;
    }
    let Some(ErrorDiagnostic(detail)) = response.extensions().get::<ErrorDiagnostic>().cloned()
    else {
        return response;
    };

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_ENVELOPE_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Could not buffer error envelope");
            return Response::from_parts(parts, Body::empty());
        }
    };

    let body = match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(mut envelope)) => {
            envelope.insert("error".into(), Value::String(detail));
            Value::Object(envelope).to_string().into_bytes()
        }
        _ => bytes.to_vec(),
    };

    parts.headers.remove(CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(body))
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TurnView {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_image: bool,
    pub is_published: bool,
}

impl From<&Turn> for TurnView {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role.as_str().to_string(),
            content: turn.content.clone(),
            timestamp: turn.timestamp,
            is_image: turn.is_image,
            is_published: turn.is_published,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplyView {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_image: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageReplyResponse {
    pub success: bool,
    pub reply: ReplyView,
    pub chat_id: String,
    pub credits_remaining: u64,
}

impl From<MessageOutcome> for MessageReplyResponse {
    fn from(outcome: MessageOutcome) -> Self {
        Self {
            success: true,
            reply: ReplyView {
                role: outcome.reply.role.as_str().to_string(),
                content: outcome.reply.content,
                timestamp: outcome.reply.timestamp,
                is_image: outcome.reply.is_image,
            },
            chat_id: outcome.chat_id,
            credits_remaining: outcome.credits_remaining,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatView {
    pub id: String,
    pub owner_id: String,
    pub owner_name: String,
    pub display_name: String,
    pub turns: Vec<TurnView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ChatThread> for ChatView {
    fn from(thread: ChatThread) -> Self {
        Self {
            turns: thread.turns().iter().map(TurnView::from).collect(),
            id: thread.id,
            owner_id: thread.owner_id,
            owner_name: thread.owner_name,
            display_name: thread.display_name,
            created_at: thread.created_at,
            updated_at: thread.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatCreatedResponse {
    pub success: bool,
    pub message: String,
    pub chat: ChatView,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChatListResponse {
    pub success: bool,
    pub chats: Vec<ChatView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserView {
    pub id: String,
    pub name: String,
    pub credits: u64,
}

impl From<Principal> for UserView {
    fn from(principal: Principal) -> Self {
        Self {
            id: principal.id,
            name: principal.name,
            credits: principal.credits,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserDataResponse {
    pub success: bool,
    pub user: UserView,
}

/// Plain `{success, message}` acknowledgement
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Per-router liveness answer
#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceHealth {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub routes: Vec<String>,
}

impl ServiceHealth {
    pub fn new(message: &str, routes: &[&str]) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            timestamp: Utc::now(),
            routes: routes.iter().map(|r| r.to_string()).collect(),
        }
    }
}
