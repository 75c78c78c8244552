//! Group endpoints.

use axum::{
    Router,
    extract::{Path, Query, State},
    routing::get,
};
use inkwell_common::{AppResult, Page};
use inkwell_core::PostView;
use inkwell_db::entities::group;
use serde::Serialize;

use crate::{extractors::PageQuery, middleware::AppState, response::ApiResponse};

/// A group and a page of its posts.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupContext {
    pub group: group::Model,
    pub page_obj: Page<PostView>,
}

/// Create group routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/group/{slug}/", get(group_posts))
}

async fn group_posts(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> AppResult<ApiResponse<GroupContext>> {
    let (group, page_obj) = state
        .post_service
        .group_posts(&slug, query.page.as_deref())
        .await?;
    Ok(ApiResponse::ok(GroupContext { group, page_obj }))
}
