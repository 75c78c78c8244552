//! Admin endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post},
};
use inkwell_common::AppResult;
use inkwell_core::CreateGroupInput;
use inkwell_db::entities::group;
use tracing::info;

use crate::{extractors::AdminUser, middleware::AppState, response::ApiResponse};

/// Create admin routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/groups/", post(create_group))
        .route("/groups/{slug}/", delete(delete_group))
        .route("/users/{username}/", delete(delete_user))
}

async fn create_group(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Json(input): Json<CreateGroupInput>,
) -> AppResult<(StatusCode, ApiResponse<group::Model>)> {
    let group = state.group_service.create(input).await?;
    info!(admin_id = %admin.id, slug = %group.slug, "Admin created group");
    Ok((StatusCode::CREATED, ApiResponse::ok(group)))
}

async fn delete_group(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<StatusCode> {
    state.group_service.delete_by_slug(&slug).await?;
    info!(admin_id = %admin.id, slug = %slug, "Admin deleted group");
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_user(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<StatusCode> {
    state.user_service.delete_by_username(&username).await?;
    info!(admin_id = %admin.id, username = %username, "Admin deleted user");
    Ok(StatusCode::NO_CONTENT)
}
