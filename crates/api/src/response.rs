//! API response types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Serialize;

/// Standard API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a success response.
    pub const fn ok(data: T) -> Self {
        Self { data }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// `303 See Other` to `location`.
#[must_use]
pub fn see_other(location: &str) -> Response {
    Redirect::to(location).into_response()
}

/// Path of a post's detail view.
#[must_use]
pub fn post_detail_path(post_id: &str) -> String {
    format!("/posts/{post_id}/")
}

/// Path of a user's profile view.
#[must_use]
pub fn profile_path(username: &str) -> String {
    format!("/profile/{}/", urlencoding::encode(username))
}

/// Login URL that returns to `next` afterwards.
#[must_use]
pub fn login_path(next: &str) -> String {
    format!(
        "/auth/login/?next={}",
        urlencoding::encode(next).replace("%2F", "/")
    )
}
