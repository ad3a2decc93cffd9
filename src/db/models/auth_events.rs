//! Database models for the authentication audit log.

use crate::auth::session::SessionTrack;
use crate::types::{AuthEventId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "auth_event_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AuthEventType {
    Login,
    Logout,
}

/// An audit record. Rows are only ever inserted by this service.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuthEventDBResponse {
    pub id: AuthEventId,
    pub event_type: AuthEventType,
    pub track: SessionTrack,
    pub success: bool,
    pub identifier: Option<String>,
    pub user_id: Option<UserId>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AuthEventCreateDBRequest {
    pub event_type: AuthEventType,
    pub track: SessionTrack,
    pub success: bool,
    pub identifier: Option<String>,
    pub user_id: Option<UserId>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub failure_reason: Option<String>,
}
