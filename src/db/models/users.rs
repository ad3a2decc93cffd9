//! Database models for users.

use crate::api::models::users::AccountStatus;
use crate::types::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A full user row, including the password hash.
///
/// Never serialized to API responses directly; convert to
/// [`crate::api::models::users::UserResponse`] first.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserDBResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub password_hash: Option<String>,
    pub status: AccountStatus,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl UserDBResponse {
    /// Whether sessions for this identity are allowed to resolve at all.
    pub fn is_resolvable(&self) -> bool {
        self.status == AccountStatus::Active && self.deleted_at.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub password_hash: Option<String>,
    pub status: AccountStatus,
}

#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub password_hash: Option<String>,
    pub status: Option<AccountStatus>,
}
