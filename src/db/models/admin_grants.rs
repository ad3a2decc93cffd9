//! Database models for admin grants.

use crate::types::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Administrative role tiers, in ascending order of privilege.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, PartialOrd, Ord, ToSchema)]
#[sqlx(type_name = "admin_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AdminRole {
    Moderator,
    Support,
    Admin,
    Superadmin,
}

/// An admin grant row. A user holds at most one grant; the admin track is
/// authorization-valid only while `is_active` is true.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AdminGrantDBResponse {
    pub user_id: UserId,
    pub role: AdminRole,
    pub is_active: bool,
    pub granted_at: DateTime<Utc>,
    pub granted_by: Option<UserId>,
}

#[derive(Debug, Clone)]
pub struct AdminGrantCreateDBRequest {
    pub user_id: UserId,
    pub role: AdminRole,
    pub granted_by: Option<UserId>,
}
