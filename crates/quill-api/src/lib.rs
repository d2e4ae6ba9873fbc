pub mod auth;
pub mod config;
pub mod docs;
pub mod error;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::routes::{chats, health, messages, user};
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    let message_routes = Router::new()
        .route("/text", post(messages::send_text))
        .route("/image", post(messages::send_image))
        .route("/health", get(messages::health));

    let chat_routes = Router::new()
        .route("/get", get(chats::list_chats))
        .route("/create", post(chats::create_chat))
        .route("/delete/:chat_id", delete(chats::delete_chat))
        .route("/message", post(chats::legacy_message))
        .route("/health", get(chats::health));

    let user_routes = Router::new().route("/data", get(user::user_data));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/docs/openapi.json", get(docs::openapi_json))
        .nest("/api/messages", message_routes)
        .nest("/api/chats", chat_routes)
        .nest("/api/user", user_routes)
        .fallback(routes::not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            response::attach_diagnostics,
        ))
        .layer(axum_middleware::from_fn(middleware::logging::log_request))
        .layer(TimeoutLayer::new(Duration::from_secs(
            state.config.server.request_timeout_secs,
        )))
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    if config.cors.enabled {
        let cors = CorsLayer::new()
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::DELETE,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers(Any);

        if config.cors.origins.iter().any(|o| o == "*") {
            cors.allow_origin(Any)
        } else {
            let parsed_origins: Vec<axum::http::HeaderValue> = config
                .cors
                .origins
                .iter()
                .filter_map(|o| o.parse::<axum::http::HeaderValue>().ok())
                .collect();

            cors.allow_origin(parsed_origins)
        }
    } else {
        CorsLayer::permissive()
    }
}
