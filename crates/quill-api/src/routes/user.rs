use axum::{extract::State, Json};
use std::sync::Arc;

use crate::{
    auth::AuthenticatedPrincipal,
    error::{ApiError, ApiResult},
    response::{UserDataResponse, UserView},
    state::AppState,
};

/// Profile and credit balance of the caller
#[utoipa::path(
    get,
    path = "/api/user/data",
    responses(
        (status = 200, description = "Current user", body = UserDataResponse),
        (status = 404, description = "User not found")
    ),
    tag = "user"
)]
pub async fn user_data(
    State(state): State<Arc<AppState>>,
    principal: AuthenticatedPrincipal,
) -> ApiResult<Json<UserDataResponse>> {
    let user = state
        .principals
        .get_principal(principal.id())
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(UserDataResponse {
        success: true,
        user: UserView::from(user),
    }))
}
