//! Authentication endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use inkwell_common::{AppError, AppResult};
use inkwell_core::{PasswordChangeInput, PasswordResetInput, SetPasswordInput, SignupInput};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    extractors::{AuthUser, MaybeAuthUser},
    middleware::{AppState, SESSION_COOKIE},
    response::{ApiResponse, see_other},
};

/// Login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    /// Where to go after logging in; the `?next=` query wins when both are given.
    #[serde(default)]
    pub next: Option<String>,
}

/// `?next=` query parameter.
#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// Login response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub id: String,
    pub username: String,
    pub token: String,
    pub next: String,
}

/// Logout response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
    pub logged_out: bool,
}

/// Password change form context.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChangeContext {
    pub username: String,
}

/// Confirmation for the password change and reset steps.
#[derive(Serialize)]
pub struct DoneResponse {
    pub ok: bool,
}

/// Whether a password reset link can still be used.
#[derive(Serialize)]
pub struct ResetLinkContext {
    pub validlink: bool,
}

/// Create auth routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup/", post(signup))
        .route("/login/", post(login))
        .route("/logout/", get(logout).post(logout))
        .route(
            "/password_change/",
            get(password_change_form).post(password_change),
        )
        .route("/password_change/done/", get(password_change_done))
        .route(
            "/password_reset/",
            get(password_reset_form).post(password_reset),
        )
        .route("/password_reset/done/", get(done))
        .route(
            "/reset/{uid}/{token}/",
            get(password_reset_confirm_form).post(password_reset_confirm),
        )
        .route("/reset/done/", get(done))
}

/// Only same-site absolute paths are followed after login.
fn safe_next(next: Option<String>) -> String {
    next.filter(|next| next.starts_with('/') && !next.starts_with("//") && !next.contains('\\'))
        .unwrap_or_else(|| "/".to_string())
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

async fn signup(
    State(state): State<AppState>,
    Json(input): Json<SignupInput>,
) -> AppResult<Response> {
    state.user_service.signup(input).await?;
    Ok(see_other("/"))
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<NextQuery>,
    Json(req): Json<LoginRequest>,
) -> AppResult<(CookieJar, ApiResponse<LoginResponse>)> {
    let user = state
        .user_service
        .authenticate(&req.username, &req.password)
        .await
        .map_err(|e| match e {
            AppError::Unauthorized => AppError::Validation(
                "Please enter a correct username and password. \
                 Note that both fields may be case-sensitive."
                    .to_string(),
            ),
            other => other,
        })?;
    let token = state.user_service.session_token(&user).await?;
    info!(user_id = %user.id, "User logged in");

    let response = LoginResponse {
        id: user.id,
        username: user.username,
        token: token.clone(),
        next: safe_next(query.next.or(req.next)),
    };
    Ok((jar.add(session_cookie(token)), ApiResponse::ok(response)))
}

async fn logout(
    MaybeAuthUser(user): MaybeAuthUser,
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<(CookieJar, ApiResponse<LogoutResponse>)> {
    if let Some(user) = user {
        state.user_service.logout(&user.id).await?;
    }

    Ok((
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        ApiResponse::ok(LogoutResponse { logged_out: true }),
    ))
}

async fn password_change_form(AuthUser(user): AuthUser) -> ApiResponse<PasswordChangeContext> {
    ApiResponse::ok(PasswordChangeContext {
        username: user.username,
    })
}

async fn password_change(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(input): Json<PasswordChangeInput>,
) -> AppResult<Response> {
    state.user_service.change_password(&user.id, input).await?;
    Ok(see_other("/auth/password_change/done/"))
}

async fn password_change_done(AuthUser(_user): AuthUser) -> ApiResponse<DoneResponse> {
    ApiResponse::ok(DoneResponse { ok: true })
}

async fn done() -> ApiResponse<DoneResponse> {
    ApiResponse::ok(DoneResponse { ok: true })
}

async fn password_reset_form() -> ApiResponse<DoneResponse> {
    ApiResponse::ok(DoneResponse { ok: true })
}

/// Always lands on the done page, whether or not the address matched.
async fn password_reset(
    State(state): State<AppState>,
    Json(input): Json<PasswordResetInput>,
) -> AppResult<Response> {
    state.user_service.request_password_reset(input).await?;
    Ok(see_other("/auth/password_reset/done/"))
}

async fn password_reset_confirm_form(
    State(state): State<AppState>,
    Path((uid, token)): Path<(String, String)>,
) -> AppResult<ApiResponse<ResetLinkContext>> {
    let validlink = state.user_service.reset_link_is_valid(&uid, &token).await?;
    Ok(ApiResponse::ok(ResetLinkContext { validlink }))
}

async fn password_reset_confirm(
    State(state): State<AppState>,
    Path((uid, token)): Path<(String, String)>,
    Json(input): Json<SetPasswordInput>,
) -> AppResult<Response> {
    state
        .user_service
        .reset_password(&uid, &token, input)
        .await?;
    Ok(see_other("/auth/reset/done/"))
}
