//! Admin-track authentication endpoints.
//!
//! Same wire shapes as the user track, but sessions minted here live under
//! the admin cookie, require an active admin grant, and are subject to the
//! inactivity and absolute timeout policy.

use axum::{Json, extract::State, http::HeaderMap};

use crate::{
    AppState,
    api::{
        handlers::auth::{login_on_track, logout_on_track},
        models::{
            auth::{AdminSessionResponse, AuthResponse, AuthSuccessResponse, LoginRequest, LoginResponse, LogoutResponse},
            users::CurrentAdmin,
        },
    },
    auth::session::SessionTrack,
    errors::Error,
};

/// Login to the admin interface
#[utoipa::path(
    post,
    path = "/admin/authentication/login",
    request_body = LoginRequest,
    tag = "admin-authentication",
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials or no active admin grant"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, headers: HeaderMap, Json(request): Json<LoginRequest>) -> Result<LoginResponse, Error> {
    login_on_track(state, headers, request, SessionTrack::Admin).await
}

/// Logout of the admin interface
#[utoipa::path(
    post,
    path = "/admin/authentication/logout",
    tag = "admin-authentication",
    responses(
        (status = 200, description = "Logout successful", body = AuthSuccessResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<LogoutResponse, Error> {
    logout_on_track(state, headers, SessionTrack::Admin).await
}

/// Probe the current admin session
#[utoipa::path(
    get,
    path = "/admin/authentication/session",
    tag = "admin-authentication",
    responses(
        (status = 200, description = "Active admin session", body = AdminSessionResponse),
        (status = 401, description = "No valid admin session"),
        (status = 403, description = "Admin grant revoked"),
    ),
    security(
        ("admin_session_token" = [])
    )
)]
#[tracing::instrument(skip_all)]
pub async fn session(current_admin: CurrentAdmin) -> Json<AdminSessionResponse> {
    Json(AdminSessionResponse {
        user: current_admin.user,
        role: current_admin.role,
    })
}
