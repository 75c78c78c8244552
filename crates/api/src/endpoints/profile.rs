//! Profile endpoints.

use axum::{
    Router,
    extract::{Path, Query, State},
    routing::get,
};
use inkwell_common::{AppResult, Page};
use inkwell_core::PostView;
use inkwell_db::entities::user;
use serde::Serialize;

use crate::{
    extractors::{MaybeAuthUser, PageQuery},
    middleware::AppState,
    response::ApiResponse,
};

/// An author's profile and a page of their posts.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileContext {
    pub author: user::Model,
    /// Whether the viewer follows the author; absent for guests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub following: Option<bool>,
    pub followers_count: u64,
    pub following_count: u64,
    pub page_obj: Page<PostView>,
}

/// Create profile routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/profile/{username}/", get(profile))
}

async fn profile(
    MaybeAuthUser(viewer): MaybeAuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<ApiResponse<ProfileContext>> {
    let author = state.user_service.get_by_username(&username).await?;
    let page_obj = state
        .post_service
        .profile_posts(&author, query.page.as_deref())
        .await?;

    let following = match viewer {
        Some(viewer) => Some(
            state
                .following_service
                .is_following(&viewer.id, &author.id)
                .await?,
        ),
        None => None,
    };
    let followers_count = state.following_service.count_followers(&author.id).await?;
    let following_count = state.following_service.count_following(&author.id).await?;

    Ok(ApiResponse::ok(ProfileContext {
        author,
        following,
        followers_count,
        following_count,
        page_obj,
    }))
}
