//! HTTP endpoints.

mod admin;
mod auth;
mod following;
mod groups;
pub mod posts;
mod profile;

use axum::{
    Router,
    extract::{DefaultBodyLimit, OriginalUri},
    middleware,
    routing::get,
};
use inkwell_common::AppError;

use crate::middleware::{AppState, auth_middleware, cache_page};

/// Create the application router.
///
/// Session authentication runs on every route; only the index page is cached.
pub fn router(state: AppState) -> Router {
    let index = Router::new()
        .route("/", get(posts::index))
        .route_layer(middleware::from_fn_with_state(state.clone(), cache_page));

    Router::new()
        .merge(index)
        .merge(posts::router())
        .merge(groups::router())
        .merge(profile::router())
        .merge(following::router())
        .nest("/auth", auth::router())
        .nest("/admin", admin::router())
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(state.max_body_bytes))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
}

async fn not_found(OriginalUri(uri): OriginalUri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}
