//! API request/response models for authentication.

use crate::api::models::users::{CurrentUser, UserResponse};
use crate::db::models::admin_grants::AdminRole;
use axum::{
    Json,
    http::{HeaderValue, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Login request, shared by both tracks. The identifier is a username or an
/// email address, matched case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthSuccessResponse {
    pub message: String,
}

/// Current user-track session, as returned by the session probe endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub user: CurrentUser,
}

/// Current admin-track session, including the role the active grant carries.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminSessionResponse {
    pub user: CurrentUser,
    pub role: AdminRole,
}

/// Successful login: the body plus the Set-Cookie header carrying the raw
/// session token. The token appears nowhere else.
#[derive(Debug)]
pub struct LoginResponse {
    pub auth_response: AuthResponse,
    pub cookie: String,
}

impl IntoResponse for LoginResponse {
    fn into_response(self) -> Response {
        let mut response = Json(self.auth_response).into_response();
        if let Ok(value) = HeaderValue::from_str(&self.cookie) {
            response.headers_mut().insert(SET_COOKIE, value);
        }
        response
    }
}

/// Logout: the body plus a Set-Cookie header clearing the track's cookie.
#[derive(Debug)]
pub struct LogoutResponse {
    pub auth_response: AuthSuccessResponse,
    pub cookie: String,
}

impl IntoResponse for LogoutResponse {
    fn into_response(self) -> Response {
        let mut response = Json(self.auth_response).into_response();
        if let Ok(value) = HeaderValue::from_str(&self.cookie) {
            response.headers_mut().insert(SET_COOKIE, value);
        }
        response
    }
}
