//! Admin password gate for the API.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use constant_time_eq::constant_time_eq;

use crate::error::AppError;
use crate::state::AppState;

/// Header accepted as an alternative to `Authorization: Bearer`.
pub const PASSWORD_HEADER: &str = "x-admin-password";

/// Axum middleware requiring the admin password, when one is configured.
///
/// Accepts `Authorization: Bearer <password>` or `x-admin-password: <password>`.
pub async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.config.admin_password() else {
        return next.run(request).await;
    };

    let headers = request.headers();
    let provided = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .or_else(|| headers.get(PASSWORD_HEADER).and_then(|v| v.to_str().ok()));

    let authorized = provided.is_some_and(|p| constant_time_eq(p.as_bytes(), expected.as_bytes()));

    if authorized {
        next.run(request).await
    } else {
        tracing::warn!(path = %request.uri().path(), "Rejected unauthenticated request");
        AppError::Auth("invalid or missing admin password".to_string()).into_response()
    }
}
