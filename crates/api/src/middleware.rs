//! API middleware.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use inkwell_common::{
    AppError, AppResult, Config, SharedPageCache, SharedStorage, cache::page_cache_key,
};
use inkwell_core::{
    CommentService, EmailService, FollowingService, GroupService, PostService, UserService,
};
use inkwell_db::repositories::{
    CommentRepository, FollowRepository, GroupRepository, PostRepository, UserRepository,
};
use sea_orm::DatabaseConnection;
use tracing::{debug, warn};

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "inkwell_session";

/// Key prefix of cached index pages.
pub const INDEX_CACHE_PREFIX: &str = "index_page";

/// Room left in a request body for the non-file form fields.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub group_service: GroupService,
    pub post_service: PostService,
    pub comment_service: CommentService,
    pub following_service: FollowingService,
    pub page_cache: SharedPageCache,
    pub index_cache_ttl: Duration,
    pub max_body_bytes: usize,
}

impl AppState {
    /// Wire repositories and services over one database connection.
    ///
    /// Fails when the mail transport cannot be built from the configuration.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: &Config,
        storage: SharedStorage,
        page_cache: SharedPageCache,
    ) -> AppResult<Self> {
        let user_repo = UserRepository::new(Arc::clone(&db));
        let group_repo = GroupRepository::new(Arc::clone(&db));
        let post_repo = PostRepository::new(Arc::clone(&db));
        let comment_repo = CommentRepository::new(Arc::clone(&db));
        let follow_repo = FollowRepository::new(db);
        let mailer = EmailService::from_config(&config.email)?;

        Ok(Self {
            user_service: UserService::new(
                user_repo.clone(),
                post_repo.clone(),
                Arc::clone(&storage),
                mailer,
                config,
            ),
            group_service: GroupService::new(group_repo.clone()),
            post_service: PostService::new(
                post_repo.clone(),
                user_repo.clone(),
                group_repo,
                storage,
                config,
            ),
            comment_service: CommentService::new(comment_repo, post_repo, user_repo),
            following_service: FollowingService::new(follow_repo),
            page_cache,
            index_cache_ttl: Duration::from_secs(config.cache.index_ttl_secs),
            max_body_bytes: config.storage.max_upload_bytes + FORM_OVERHEAD_BYTES,
        })
    }
}

/// Session token from `Authorization: Bearer` or the session cookie.
fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
    {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

/// Authentication middleware.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(token) = session_token(req.headers()) {
        match state.user_service.authenticate_by_token(&token).await {
            Ok(user) => {
                req.extensions_mut().insert(user);
            }
            Err(AppError::Unauthorized) => debug!("Unknown session token"),
            Err(e) => warn!(error = %e, "Session lookup failed"),
        }
    }

    next.run(req).await
}

fn header_str(headers: &HeaderMap, name: HeaderName) -> &str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

/// Serve GET responses from the page cache, storing successful ones.
///
/// Entries vary on the request URI and the viewer's `Cookie` and
/// `Authorization` headers, and expire after `index_cache_ttl`.
pub async fn cache_page(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if req.method() != Method::GET {
        return next.run(req).await;
    }

    let uri = req.uri().to_string();
    let key = page_cache_key(
        INDEX_CACHE_PREFIX,
        &[
            uri.as_str(),
            header_str(req.headers(), header::COOKIE),
            header_str(req.headers(), header::AUTHORIZATION),
        ],
    );

    match state.page_cache.get(&key).await {
        Ok(Some(body)) => {
            return (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                body,
            )
                .into_response();
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Page cache read failed"),
    }

    let response = next.run(req).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => return AppError::Internal(e.to_string()).into_response(),
    };

    if let Err(e) = state
        .page_cache
        .set(&key, bytes.to_vec(), state.index_cache_ttl)
        .await
    {
        warn!(error = %e, "Page cache write failed");
    }

    Response::from_parts(parts, Body::from(bytes))
}
