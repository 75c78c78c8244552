//! Following endpoints: the follow feed and follow/unfollow actions.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Response,
    routing::get,
};
use inkwell_common::AppResult;

use crate::{
    endpoints::posts::PostListContext,
    extractors::{AuthUser, PageQuery},
    middleware::AppState,
    response::{ApiResponse, profile_path, see_other},
};

/// Create following routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/follow/", get(feed))
        .route("/profile/{username}/follow/", get(follow))
        .route("/profile/{username}/unfollow/", get(unfollow))
}

/// Posts by the authors the viewer follows.
async fn feed(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<ApiResponse<PostListContext>> {
    let page_obj = state
        .post_service
        .feed(&user.id, query.page.as_deref())
        .await?;
    Ok(ApiResponse::ok(PostListContext { page_obj }))
}

async fn follow(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let author = state.user_service.get_by_username(&username).await?;
    state.following_service.follow(&user, &author).await?;
    Ok(see_other(&profile_path(&author.username)))
}

async fn unfollow(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let author = state.user_service.get_by_username(&username).await?;
    state.following_service.unfollow(&user, &author).await?;
    Ok(see_other(&profile_path(&author.username)))
}
