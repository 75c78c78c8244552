//! Post endpoints: index, detail, create, edit, delete and comments.

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use inkwell_common::{AppError, AppResult, Page};
use inkwell_core::{CommentInput, CommentView, EditOutcome, ImageUpload, PostInput, PostView};
use inkwell_db::entities::group;
use serde::Serialize;
use tracing::debug;

use crate::{
    extractors::{AuthUser, PageQuery},
    middleware::AppState,
    response::{ApiResponse, post_detail_path, profile_path, see_other},
};

/// A page of posts.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostListContext {
    pub page_obj: Page<PostView>,
}

/// A post with its comments.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetailContext {
    pub post: PostView,
    pub comments: Vec<CommentView>,
}

/// Data for the create and edit forms.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostFormContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<PostView>,
    pub groups: Vec<group::Model>,
    pub is_edit: bool,
}

/// Create post routes. The index route is mounted separately behind the page cache.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create/", get(create_form).post(create))
        .route("/posts/{id}/", get(detail))
        .route("/posts/{id}/edit/", get(edit_form).post(edit))
        .route("/posts/{id}/delete/", post(delete))
        .route("/posts/{id}/comment/", get(comment_redirect).post(add_comment))
}

/// All posts, newest first.
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<ApiResponse<PostListContext>> {
    let page_obj = state.post_service.index(query.page.as_deref()).await?;
    Ok(ApiResponse::ok(PostListContext { page_obj }))
}

async fn detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<PostDetailContext>> {
    let post = state.post_service.get(&id).await?;
    let comments = state.comment_service.list_for_post(&post.post.id).await?;
    Ok(ApiResponse::ok(PostDetailContext { post, comments }))
}

async fn create_form(
    AuthUser(_user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<PostFormContext>> {
    let groups = state.group_service.list().await?;
    Ok(ApiResponse::ok(PostFormContext {
        post: None,
        groups,
        is_edit: false,
    }))
}

async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Response> {
    let (input, image) = read_post_form(multipart).await?;
    state.post_service.create(&user, input, image).await?;
    Ok(see_other(&profile_path(&user.username)))
}

async fn edit_form(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let post = state.post_service.get(&id).await?;
    if post.post.author_id != user.id {
        debug!(post_id = %id, user_id = %user.id, "Edit form refused to non-author");
        return Ok(see_other(&post_detail_path(&id)));
    }

    let groups = state.group_service.list().await?;
    Ok(ApiResponse::ok(PostFormContext {
        post: Some(post),
        groups,
        is_edit: true,
    })
    .into_response())
}

async fn edit(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<Response> {
    let (input, image) = read_post_form(multipart).await?;
    let outcome = state.post_service.update(&user, &id, input, image).await?;
    if matches!(outcome, EditOutcome::NotAuthor) {
        debug!(post_id = %id, user_id = %user.id, "Edit refused to non-author");
    }
    Ok(see_other(&post_detail_path(&id)))
}

async fn delete(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    match state.post_service.delete(&user, &id).await? {
        EditOutcome::Updated(()) => Ok(see_other(&profile_path(&user.username))),
        EditOutcome::NotAuthor => Ok(see_other(&post_detail_path(&id))),
    }
}

async fn comment_redirect(AuthUser(_user): AuthUser, Path(id): Path<String>) -> Response {
    see_other(&post_detail_path(&id))
}

async fn add_comment(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<CommentInput>,
) -> AppResult<Response> {
    state.comment_service.create(&user, &id, input).await?;
    Ok(see_other(&post_detail_path(&id)))
}

/// Read the `text`, `group` and `image` fields of a post form.
///
/// An empty file part means no image was chosen.
async fn read_post_form(mut multipart: Multipart) -> AppResult<(PostInput, Option<ImageUpload>)> {
    let mut input = PostInput::default();
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let name = field.name().map(ToString::to_string);
        match name.as_deref() {
            Some("text") => {
                input.text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
            }
            Some("group") => {
                input.group = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(e.body_text()))?,
                );
            }
            Some("image") => {
                let file_name = field.file_name().map(ToString::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                if !data.is_empty() {
                    image = Some(ImageUpload {
                        file_name,
                        data: data.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }

    Ok((input, image))
}
